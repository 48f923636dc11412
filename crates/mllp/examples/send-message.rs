//! Send one HL7 message and print the acknowledgement.
//!
//! Run with (against a listener on 127.0.0.1:2575):
//!   cargo run --example send-message

use mllp::endpoint::{EndpointConfig, MllpClient};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EndpointConfig::parse("127.0.0.1:2575?responseTimeout=3000")?;
    let charset = config.charset;
    let mut client = MllpClient::new(config);

    let message = "MSH|^~\\&|HIS|RIH|EKG|EKG|||ADT^A01|MSG001|P|2.5\rPID|1||12345\r";
    let ack = client.send(message.as_bytes())?;

    match ack {
        Some(ack) => println!("acknowledgement: {}", charset.decode(&ack)),
        None => println!("sent without waiting for acknowledgement"),
    }

    client.close();
    Ok(())
}
