use std::fs;
use std::io::Read;
use std::time::Duration;

use mllp_endpoint::{EndpointConfig, MllpClient};

use crate::cmd::SendArgs;
use crate::exit::{config_error, endpoint_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = EndpointConfig::parse(&args.addr)
        .map_err(|err| config_error("invalid address", err))?;
    config.response_timeout = parse_duration(&args.timeout)?;
    if args.no_wait {
        config.wait_for_ack = false;
    }
    let charset = config.charset;
    let peer = format!("{}:{}", config.host, config.port);

    let payload = resolve_payload(&args)?;
    let mut client = MllpClient::new(config);
    let ack = client
        .send(&payload)
        .map_err(|err| endpoint_error("send failed", err))?;

    if let Some(ack) = ack {
        print_message(&ack, &peer, charset, format);
    }
    client.close();

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        // \n is easier to type than a literal carriage return; HL7
        // segments are CR-separated on the wire.
        return Ok(data.replace('\n', "\r").into_bytes());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }

    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| crate::exit::io_error("failed reading stdin", err))?;
    Ok(buf)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn data_payload_maps_newlines_to_segment_separators() {
        let args = SendArgs {
            addr: "localhost:2575".to_string(),
            data: Some("MSH|^~\\&|A\nPID|1".to_string()),
            file: None,
            no_wait: false,
            timeout: "5s".to_string(),
        };
        let payload = resolve_payload(&args).unwrap();
        assert_eq!(payload, b"MSH|^~\\&|A\rPID|1".to_vec());
    }
}
