use std::time::Duration;

/// Errors that can occur in MLLP endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Transport-level error (bind, connect, accept, raw I/O).
    #[error("transport error: {0}")]
    Transport(#[from] mllp_transport::TransportError),

    /// Envelope-level error (malformed or truncated framing).
    #[error("envelope error: {0}")]
    Envelope(#[from] mllp_codec::FrameError),

    /// No acknowledgement arrived within the configured window. The
    /// connection is left open; the caller decides whether to retry on it
    /// or close.
    #[error("no acknowledgement within {0:?}")]
    ResponseTimeout(Duration),

    /// An inbound message stalled mid-frame past the configured window.
    #[error("no complete request within {0:?}")]
    RequestTimeout(Duration),

    /// Auto-acknowledgement is disabled and the handler supplied no usable
    /// reply body.
    #[error("invalid acknowledgement body: {0}")]
    InvalidAckBody(String),

    /// Endpoint configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl EndpointError {
    /// True when the error is a connect-phase failure, letting callers
    /// distinguish "never reached the peer" from "peer did not answer".
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            EndpointError::Transport(mllp_transport::TransportError::Connect { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, EndpointError>;
