//! TCP socket layer for MLLP endpoints.
//!
//! Provides the blocking socket plumbing everything else builds on:
//! connect-with-timeout, bind-with-backlog, per-connection socket option
//! application, and best-effort teardown. No framing lives here; see
//! `mllp-codec` for the envelope.

pub mod error;
pub mod options;
pub mod tcp;

pub use error::{Result, TransportError};
pub use options::SocketOptions;
pub use tcp::{connect, shutdown_stream, TcpBinding};
