use bytes::{BufMut, BytesMut};

/// Frame start marker (vertical tab).
pub const START_BLOCK: u8 = 0x0B;

/// First byte of the frame end sequence (file separator).
pub const END_BLOCK: u8 = 0x1C;

/// Second byte of the frame end sequence (carriage return).
pub const CARRIAGE_RETURN: u8 = 0x0D;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode a payload into the MLLP envelope.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────────┬────────────┬────────────┐
/// │ 0x0B       │ Payload          │ 0x1C       │ 0x0D       │
/// │ start      │ (verbatim bytes) │ end        │ end        │
/// └────────────┴──────────────────┴────────────┴────────────┘
/// ```
///
/// No escaping is performed: HL7 practice excludes the raw marker bytes
/// from message content, and this codec assumes the same.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 3);
    dst.put_u8(START_BLOCK);
    dst.put_slice(payload);
    dst.put_u8(END_BLOCK);
    dst.put_u8(CARRIAGE_RETURN);
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
