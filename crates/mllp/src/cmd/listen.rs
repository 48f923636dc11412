use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mllp_endpoint::{EndpointConfig, HandlerError, Hl7AckGenerator, MllpServer};

use crate::cmd::ListenArgs;
use crate::exit::{config_error, endpoint_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = EndpointConfig::parse(&args.addr)
        .map_err(|err| config_error("invalid address", err))?;
    if args.echo {
        config.auto_ack = false;
    }
    let charset = config.charset;
    let echo = args.echo;
    let endpoint_label = format!("{}:{}", config.host, config.port);

    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let handler = move |message: &[u8]| -> Result<Option<Vec<u8>>, HandlerError> {
        print_message(message, &endpoint_label, charset, format);
        counter.fetch_add(1, Ordering::SeqCst);
        if echo {
            Ok(Some(message.to_vec()))
        } else {
            Ok(None)
        }
    };

    let mut server = MllpServer::start(config, Arc::new(handler), Arc::new(Hl7AckGenerator))
        .map_err(|err| endpoint_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        if let Some(count) = args.count {
            if received.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    server.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
