//! Minimal acknowledging server — accepts connections and auto-acks every
//! message.
//!
//! Run with:
//!   cargo run --example ack-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:2575 \
//!     --data 'MSH|^~\&|HIS|RIH|EKG|EKG|||ADT^A01|MSG001|P|2.5'

use std::sync::Arc;
use std::time::Duration;

use mllp::endpoint::{EndpointConfig, HandlerError, Hl7AckGenerator, MllpServer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EndpointConfig::parse("127.0.0.1:2575")?;

    let handler = |message: &[u8]| -> Result<Option<Vec<u8>>, HandlerError> {
        eprintln!("Received {} bytes", message.len());
        Ok(None)
    };

    let _server = MllpServer::start(config, Arc::new(handler), Arc::new(Hl7AckGenerator))?;
    eprintln!("Listening on 127.0.0.1:2575");

    // Serve until interrupted; workers run on their own threads.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
