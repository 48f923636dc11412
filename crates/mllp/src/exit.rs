use std::fmt;
use std::io;

use mllp_codec::FrameError;
use mllp_endpoint::{ConfigError, EndpointError};
use mllp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ReadTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn endpoint_error(context: &str, err: EndpointError) -> CliError {
    match err {
        EndpointError::Transport(err) => transport_error(context, err),
        EndpointError::Envelope(err) => frame_error(context, err),
        EndpointError::ResponseTimeout(_) | EndpointError::RequestTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        EndpointError::InvalidAckBody(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        EndpointError::Config(err) => config_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timeout_errors_map_to_timeout_code() {
        let err = endpoint_error(
            "send failed",
            EndpointError::ResponseTimeout(Duration::from_millis(100)),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn connect_refused_maps_to_failure_code() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "127.0.0.1:2575".parse().unwrap(),
                source: refused,
            },
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn framing_errors_map_to_data_invalid() {
        let err = frame_error("decode failed", FrameError::BrokenEndMarker { found: 0x00 });
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn unknown_option_maps_to_usage() {
        let err = config_error("bad address", ConfigError::UnknownOption("bogus".into()));
        assert_eq!(err.code, USAGE);
    }
}
