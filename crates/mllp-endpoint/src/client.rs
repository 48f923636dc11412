use std::net::TcpStream;

use bytes::Bytes;
use mllp_codec::{FrameError, FrameReader, FrameWriter};
use mllp_transport::{connect, shutdown_stream, TransportError};
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::error::{EndpointError, Result};

/// Synchronous MLLP client over one persistent TCP connection.
///
/// The connection is opened lazily on first use and re-opened after a
/// failure tears it down; no retry policy lives here. A send that fails
/// reports a typed error and the caller decides. Not safe for concurrent
/// sends: one logical connection carries one request/response at a time,
/// which `&mut self` enforces.
pub struct MllpClient {
    config: EndpointConfig,
    conn: Option<Connection>,
}

struct Connection {
    reader: FrameReader<TcpStream>,
    writer: FrameWriter<TcpStream>,
}

impl MllpClient {
    /// Create a client for the configured endpoint. Does not connect.
    pub fn new(config: EndpointConfig) -> Self {
        Self { config, conn: None }
    }

    /// The endpoint configuration this client was built with.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// True when a connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Ensure a live connection exists, opening one if needed.
    ///
    /// A socket with a pending error is treated as disconnected and
    /// replaced. Connect failures are not retried here.
    pub fn ensure_connected(&mut self) -> Result<()> {
        if let Some(conn) = &self.conn {
            match conn.writer.get_ref().take_error() {
                Ok(None) => return Ok(()),
                Ok(Some(err)) => {
                    debug!(%err, "cached connection reports error, reconnecting");
                    self.teardown();
                }
                Err(err) => {
                    debug!(%err, "cached connection unreadable, reconnecting");
                    self.teardown();
                }
            }
        }

        let addr = self.config.socket_addr()?;
        let stream = connect(addr, &self.config.socket_options())?;
        stream
            .set_read_timeout(Some(self.config.response_timeout))
            .map_err(TransportError::Io)?;

        let read_half = stream.try_clone().map_err(TransportError::Io)?;
        self.conn = Some(Connection {
            reader: FrameReader::with_config(read_half, self.config.frame_config()),
            writer: FrameWriter::with_config(stream, self.config.frame_config()),
        });
        Ok(())
    }

    /// Send one framed message and, when `wait_for_ack` is set, block for
    /// the framed acknowledgement.
    ///
    /// On a response timeout the connection stays open for the caller's
    /// next attempt; on malformed response framing or an I/O failure the
    /// connection is torn down before the error is returned.
    pub fn send(&mut self, payload: &[u8]) -> Result<Option<Bytes>> {
        self.ensure_connected()?;

        let Some(mut conn) = self.conn.take() else {
            unreachable!("ensure_connected established a connection");
        };

        if let Err(err) = conn.writer.write_frame(payload) {
            shutdown_stream(conn.writer.get_ref());
            return Err(EndpointError::Envelope(err));
        }

        if !self.config.wait_for_ack {
            self.conn = Some(conn);
            return Ok(None);
        }

        match conn.reader.read_frame() {
            Ok(ack) => {
                self.conn = Some(conn);
                Ok(Some(ack))
            }
            Err(FrameError::ReadTimeout { .. }) => {
                self.conn = Some(conn);
                Err(EndpointError::ResponseTimeout(self.config.response_timeout))
            }
            Err(err) => {
                warn!(%err, "tearing down connection after malformed response");
                shutdown_stream(conn.writer.get_ref());
                Err(EndpointError::Envelope(err))
            }
        }
    }

    /// Close the connection. Idempotent; teardown errors are logged and
    /// swallowed so resource release never fails the caller.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(conn) = self.conn.take() {
            shutdown_stream(conn.writer.get_ref());
        }
    }
}

impl Drop for MllpClient {
    fn drop(&mut self) {
        self.teardown();
    }
}
