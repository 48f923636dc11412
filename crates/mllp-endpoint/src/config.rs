use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use mllp_transport::SocketOptions;

/// Errors raised while parsing or resolving endpoint configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The connection string carries no port.
    #[error("connection string has no port: {0:?}")]
    MissingPort(String),

    /// The port is not a number in 1..=65535.
    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    /// An option key is not part of the recognized set.
    #[error("unknown option: {0:?}")]
    UnknownOption(String),

    /// An option value failed to parse for its key.
    #[error("invalid value for {option}: {value:?}")]
    InvalidValue { option: String, value: String },

    /// The charset name is not supported.
    #[error("unsupported charset: {0:?}")]
    UnknownCharset(String),

    /// The hostname did not resolve to a socket address.
    #[error("failed to resolve {addr}: {source}")]
    AddressResolve {
        addr: String,
        source: std::io::Error,
    },
}

/// Payload text encoding.
///
/// HL7 traffic is overwhelmingly UTF-8, US-ASCII, or ISO-8859-1; the
/// envelope itself is encoding-agnostic and payloads stay bytes on the
/// wire. This only governs byte↔text conversion at the edges (display,
/// string-typed callers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Charset {
    /// Canonical charset name.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Ascii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode payload bytes to text. Unmappable bytes are replaced, never
    /// an error: display paths must not fail on foreign content.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                .collect(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encode text to payload bytes. Characters outside the charset are
    /// replaced with `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Charset::Latin1 => text
                .chars()
                .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl FromStr for Charset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "US-ASCII" | "ASCII" => Ok(Charset::Ascii),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" => Ok(Charset::Latin1),
            _ => Err(ConfigError::UnknownCharset(s.to_string())),
        }
    }
}

/// Immutable endpoint configuration.
///
/// Created once at endpoint construction and shared read-only by every
/// connection spawned from the same endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Hostname to bind (server) or connect to (client).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Listen backlog.
    pub backlog: i32,
    /// Outbound connect timeout.
    pub connect_timeout: Duration,
    /// Response/read timeout; also bounds the accept loop's poll cycle.
    pub response_timeout: Duration,
    /// SO_KEEPALIVE.
    pub keep_alive: bool,
    /// TCP_NODELAY.
    pub tcp_no_delay: bool,
    /// SO_REUSEADDR on the listening socket.
    pub reuse_address: bool,
    /// SO_RCVBUF hint.
    pub receive_buffer_size: usize,
    /// SO_SNDBUF hint.
    pub send_buffer_size: usize,
    /// Server auto-generates acknowledgements (vs. handler supplies them).
    pub auto_ack: bool,
    /// Client blocks for a framed acknowledgement after each send.
    pub wait_for_ack: bool,
    /// Payload text encoding at the byte↔text edges.
    pub charset: Charset,
    /// Maximum accepted payload size per frame.
    pub max_payload_size: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            // IANA-registered HL7 MLLP port.
            port: 2575,
            backlog: 5,
            connect_timeout: Duration::from_millis(30_000),
            response_timeout: Duration::from_millis(5_000),
            keep_alive: true,
            tcp_no_delay: true,
            reuse_address: false,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            auto_ack: true,
            wait_for_ack: true,
            charset: Charset::Utf8,
            max_payload_size: mllp_codec::DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl EndpointConfig {
    /// Parse a `host:port?option=value&option=value` connection string.
    ///
    /// The hostname may be omitted (`":2575"` or bare `"2575"`) and then
    /// defaults to `0.0.0.0`, meaning "bind all interfaces" on the server
    /// side. Unrecognized options are errors, not silently ignored.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let (address, query) = match input.split_once('?') {
            Some((address, query)) => (address, Some(query)),
            None => (input, None),
        };

        let (host, port_str) = match address.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => ("", address),
        };
        if port_str.is_empty() {
            return Err(ConfigError::MissingPort(input.to_string()));
        }
        let port: u16 = port_str
            .parse()
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| ConfigError::InvalidPort(port_str.to_string()))?;

        let mut config = Self {
            host: if host.is_empty() {
                "0.0.0.0".to_string()
            } else {
                host.to_string()
            },
            port,
            ..Self::default()
        };

        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    ConfigError::InvalidValue {
                        option: pair.to_string(),
                        value: String::new(),
                    }
                })?;
                config.apply_option(key, value)?;
            }
        }

        Ok(config)
    }

    fn apply_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            option: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "backlog" => self.backlog = value.parse().map_err(|_| invalid())?,
            "connectTimeout" => {
                self.connect_timeout =
                    Duration::from_millis(value.parse().map_err(|_| invalid())?);
            }
            "responseTimeout" => {
                self.response_timeout =
                    Duration::from_millis(value.parse().map_err(|_| invalid())?);
            }
            "keepAlive" => self.keep_alive = value.parse().map_err(|_| invalid())?,
            "tcpNoDelay" => self.tcp_no_delay = value.parse().map_err(|_| invalid())?,
            "reuseAddress" => self.reuse_address = value.parse().map_err(|_| invalid())?,
            "receiveBufferSize" => {
                self.receive_buffer_size = value.parse().map_err(|_| invalid())?;
            }
            "sendBufferSize" => self.send_buffer_size = value.parse().map_err(|_| invalid())?,
            "autoAck" => self.auto_ack = value.parse().map_err(|_| invalid())?,
            "waitForAck" => self.wait_for_ack = value.parse().map_err(|_| invalid())?,
            "charset" => self.charset = value.parse()?,
            "maxPayloadSize" => self.max_payload_size = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    /// Resolve `host:port` to a socket address (first match).
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        let resolve_err = |source| ConfigError::AddressResolve {
            addr: addr.clone(),
            source,
        };
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(resolve_err)?
            .next()
            .ok_or_else(|| {
                resolve_err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses returned",
                ))
            })
    }

    /// The per-connection socket options this configuration implies.
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            connect_timeout: self.connect_timeout,
            keep_alive: self.keep_alive,
            tcp_no_delay: self.tcp_no_delay,
            receive_buffer_size: self.receive_buffer_size,
            send_buffer_size: self.send_buffer_size,
        }
    }

    /// The frame codec configuration this configuration implies.
    pub fn frame_config(&self) -> mllp_codec::FrameConfig {
        mllp_codec::FrameConfig {
            max_payload_size: self.max_payload_size,
        }
    }
}
