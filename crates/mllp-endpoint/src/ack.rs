//! Acknowledgement generation.
//!
//! The endpoint treats acknowledgement bodies as opaque bytes produced by a
//! pluggable generator; [`Hl7AckGenerator`] is the built-in default, a
//! small envelope-adjacent utility rather than an HL7 parser.

/// Outcome of a processing exchange, as seen by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// The handler processed the message.
    Accept,
    /// The handler failed.
    Error,
}

impl AckStatus {
    /// The MSA-1 acknowledgement code for this outcome.
    pub fn code(&self) -> &'static str {
        match self {
            AckStatus::Accept => "AA",
            AckStatus::Error => "AE",
        }
    }
}

/// Produces an acknowledgement payload for a received message.
///
/// Implementations must be cheap and infallible: the worker calls this on
/// the error path too, and a generator that can itself fail would leave
/// the peer's request unanswered.
pub trait AckGenerator: Send + Sync {
    fn generate(&self, message: &[u8], status: AckStatus) -> Vec<u8>;
}

/// Default generator: builds an `MSH` + `MSA` acknowledgement from the
/// original message's MSH segment, swapping sender and receiver and
/// echoing the MSH-10 control id.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hl7AckGenerator;

impl AckGenerator for Hl7AckGenerator {
    fn generate(&self, message: &[u8], status: AckStatus) -> Vec<u8> {
        let msh = MshFields::scan(message);
        let sep = msh.field_separator as char;
        let ack = format!(
            "MSH{sep}^~\\&{sep}{}{sep}{}{sep}{}{sep}{}{sep}{sep}{sep}ACK{sep}{}{sep}P{sep}{}\r\
             MSA{sep}{}{sep}{}\r",
            msh.receiving_app,
            msh.receiving_facility,
            msh.sending_app,
            msh.sending_facility,
            msh.control_id,
            msh.version,
            status.code(),
            msh.control_id,
        );
        ack.into_bytes()
    }
}

/// The MSH fields the acknowledgement needs, with empty-string fallbacks
/// for anything missing; a degenerate message still gets an answer.
struct MshFields {
    field_separator: u8,
    sending_app: String,
    sending_facility: String,
    receiving_app: String,
    receiving_facility: String,
    control_id: String,
    version: String,
}

impl MshFields {
    fn scan(message: &[u8]) -> Self {
        let mut fields = Self {
            field_separator: b'|',
            sending_app: String::new(),
            sending_facility: String::new(),
            receiving_app: String::new(),
            receiving_facility: String::new(),
            control_id: String::new(),
            version: String::new(),
        };

        if !message.starts_with(b"MSH") || message.len() < 4 {
            return fields;
        }
        fields.field_separator = message[3];

        let segment_end = message
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(message.len());
        let segment = &message[..segment_end];

        let sep = fields.field_separator;
        let take = |index: usize| -> String {
            segment
                .split(move |&b| b == sep)
                .nth(index)
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .unwrap_or_default()
        };

        fields.sending_app = take(2);
        fields.sending_facility = take(3);
        fields.receiving_app = take(4);
        fields.receiving_facility = take(5);
        fields.control_id = take(9);
        fields.version = take(11);
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &[u8] =
        b"MSH|^~\\&|SENDAPP|SENDFAC|RECVAPP|RECVFAC|20240101||ADT^A01|MSG00042|P|2.5\r\
          PID|1||12345\r";

    #[test]
    fn accept_ack_echoes_control_id() {
        let ack = Hl7AckGenerator.generate(ADT, AckStatus::Accept);
        let text = String::from_utf8(ack).unwrap();
        assert!(text.contains("MSA|AA|MSG00042"), "ack was: {text}");
    }

    #[test]
    fn error_ack_uses_error_code() {
        let ack = Hl7AckGenerator.generate(ADT, AckStatus::Error);
        let text = String::from_utf8(ack).unwrap();
        assert!(text.contains("MSA|AE|MSG00042"), "ack was: {text}");
    }

    #[test]
    fn ack_swaps_sender_and_receiver() {
        let ack = Hl7AckGenerator.generate(ADT, AckStatus::Accept);
        let text = String::from_utf8(ack).unwrap();
        let msh = text.lines().next().unwrap_or(&text);
        let msh_fields: Vec<&str> = msh.trim_end_matches('\r').split('|').collect();
        assert_eq!(msh_fields[2], "RECVAPP");
        assert_eq!(msh_fields[3], "RECVFAC");
        assert_eq!(msh_fields[4], "SENDAPP");
        assert_eq!(msh_fields[5], "SENDFAC");
    }

    #[test]
    fn ack_is_typed_ack_with_original_version() {
        let ack = Hl7AckGenerator.generate(ADT, AckStatus::Accept);
        let text = String::from_utf8(ack).unwrap();
        assert!(text.contains("|ACK|"));
        assert!(text.contains("|2.5\r"));
    }

    #[test]
    fn non_hl7_payload_gets_degenerate_ack() {
        let ack = Hl7AckGenerator.generate(b"not hl7 at all", AckStatus::Error);
        let text = String::from_utf8(ack).unwrap();
        assert!(text.contains("MSA|AE|"));
    }

    #[test]
    fn alternate_field_separator_is_honoured() {
        let msg = b"MSH#^~\\&#APP#FAC#DEST#DFAC#20240101##ORU^R01#C77#P#2.4\r";
        let ack = Hl7AckGenerator.generate(msg, AckStatus::Accept);
        let text = String::from_utf8(ack).unwrap();
        assert!(text.contains("MSA#AA#C77"), "ack was: {text}");
    }
}
