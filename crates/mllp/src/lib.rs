//! MLLP transport engine for HL7 message exchange over TCP.
//!
//! mllp implements the Minimal Lower Layer Protocol: envelope framing, a
//! thread-per-connection server with acknowledgement generation, and a
//! synchronous single-connection client.
//!
//! # Crate Structure
//!
//! - [`transport`] — Blocking TCP socket layer (connect, bind, options)
//! - [`codec`] — MLLP envelope framing (frame reader/writer)
//! - [`endpoint`] — Client and server endpoints (behind `endpoint` feature)

/// Re-export transport types.
pub mod transport {
    pub use mllp_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use mllp_codec::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use mllp_endpoint::*;
}
