use std::net::TcpStream;
use std::time::Duration;

use socket2::SockRef;
use tracing::warn;

/// Per-connection socket options applied at connect/accept time.
///
/// Shared by the client transport and the server listener; the owning
/// endpoint configuration decides the values, this type applies them.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Maximum time to wait for an outbound connect to complete.
    pub connect_timeout: Duration,
    /// Enable SO_KEEPALIVE.
    pub keep_alive: bool,
    /// Disable Nagle's algorithm (TCP_NODELAY).
    pub tcp_no_delay: bool,
    /// SO_RCVBUF hint in bytes.
    pub receive_buffer_size: usize,
    /// SO_SNDBUF hint in bytes.
    pub send_buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(30_000),
            keep_alive: true,
            tcp_no_delay: true,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
        }
    }
}

impl SocketOptions {
    /// Apply these options to a connected stream.
    ///
    /// Option application is best-effort: a kernel that rejects a buffer
    /// size hint must not kill an otherwise healthy connection, so failures
    /// are logged and the stream is left usable.
    pub fn apply(&self, stream: &TcpStream) {
        if let Err(err) = stream.set_nodelay(self.tcp_no_delay) {
            warn!(%err, "failed to set TCP_NODELAY");
        }

        let sock = SockRef::from(stream);
        if let Err(err) = sock.set_keepalive(self.keep_alive) {
            warn!(%err, "failed to set SO_KEEPALIVE");
        }
        if let Err(err) = sock.set_recv_buffer_size(self.receive_buffer_size) {
            warn!(%err, "failed to set receive buffer size");
        }
        if let Err(err) = sock.set_send_buffer_size(self.send_buffer_size) {
            warn!(%err, "failed to set send buffer size");
        }
    }
}
