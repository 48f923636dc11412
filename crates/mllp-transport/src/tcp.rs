use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::options::SocketOptions;

/// A bound, listening TCP socket with an explicit backlog.
///
/// `std::net::TcpListener::bind` hardcodes its backlog, so the bind path
/// goes through `socket2`: reuse-address and the receive buffer hint must be
/// set before `bind`, and the backlog is a `listen` argument.
pub struct TcpBinding {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpBinding {
    /// Bind and listen on `addr`.
    pub fn bind(
        addr: SocketAddr,
        backlog: i32,
        reuse_address: bool,
        receive_buffer_size: usize,
    ) -> Result<Self> {
        let bind_err = |source| TransportError::Bind { addr, source };

        let domain = Domain::for_address(addr);
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(bind_err)?;
        socket.set_reuse_address(reuse_address).map_err(bind_err)?;
        socket
            .set_recv_buffer_size(receive_buffer_size)
            .map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.listen(backlog).map_err(bind_err)?;

        let listener: TcpListener = socket.into();
        let addr = listener.local_addr().map_err(bind_err)?;
        info!(%addr, backlog, "listening on tcp socket");

        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking unless non-blocking mode is set).
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((stream, peer))
    }

    /// Switch the listening socket between blocking and non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// The address this socket is actually bound to (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Connect to `addr` with the configured connect timeout and socket options.
pub fn connect(addr: SocketAddr, options: &SocketOptions) -> Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, options.connect_timeout)
        .map_err(|source| TransportError::Connect { addr, source })?;
    options.apply(&stream);
    debug!(%addr, "connected to tcp endpoint");
    Ok(stream)
}

/// Tear a connection down: disable linger, shut down both directions.
///
/// Teardown must not fail the caller's primary operation; errors here are
/// logged and swallowed. Safe to call on an already-dead stream.
pub fn shutdown_stream(stream: &TcpStream) {
    let sock = socket2::SockRef::from(stream);
    if let Err(err) = sock.set_linger(None) {
        debug!(%err, "failed to disable linger during teardown");
    }
    if let Err(err) = stream.shutdown(Shutdown::Both) {
        debug!(%err, "shutdown during teardown failed");
    }
}
