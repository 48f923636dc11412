//! MLLP envelope framing.
//!
//! Every message on the wire is wrapped in the Minimal Lower Layer Protocol
//! envelope:
//!
//! ```text
//! <0x0B> <payload bytes...> <0x1C> <0x0D>
//! ```
//!
//! There is no length prefix and no escaping: HL7 content excludes the
//! three control bytes, so the markers alone delimit a frame. Bytes arriving
//! before the start marker are out-of-band noise and are discarded, not
//! treated as an error.
//!
//! No partial reads, no buffer management in user code: [`FrameReader`]
//! hands out complete payloads, [`FrameWriter`] takes them.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, FrameConfig, CARRIAGE_RETURN, DEFAULT_MAX_PAYLOAD, END_BLOCK, START_BLOCK,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
