use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mllp_transport::{shutdown_stream, TcpBinding, TransportError};
use tracing::{debug, error, info, warn};

use crate::ack::AckGenerator;
use crate::config::EndpointConfig;
use crate::error::Result;
use crate::handler::MessageHandler;
use crate::registry::ConnectionRegistry;
use crate::worker::{self, WorkerContext};

/// Upper bound on the accept loop's poll interval so shutdown stays
/// responsive even with a long response timeout.
const ACCEPT_POLL_CAP: Duration = Duration::from_millis(250);

/// Window for the post-accept probe read that tells liveness probes apart
/// from protocol clients.
const PROBE_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// MLLP server endpoint: binds, accepts, and runs one worker thread per
/// connection.
pub struct MllpServer;

impl MllpServer {
    /// Bind the configured address and spawn the accept loop.
    ///
    /// The returned handle owns the server lifecycle: dropping it (or
    /// calling [`ServerHandle::stop`]) signals shutdown, which the accept
    /// loop observes within one poll cycle and idle workers observe
    /// within one read-timeout cycle.
    pub fn start(
        config: EndpointConfig,
        handler: Arc<dyn MessageHandler>,
        acks: Arc<dyn AckGenerator>,
    ) -> Result<ServerHandle> {
        let addr = config.socket_addr()?;
        let binding = TcpBinding::bind(
            addr,
            config.backlog,
            config.reuse_address,
            config.receive_buffer_size,
        )?;
        binding.set_nonblocking(true)?;
        let local_addr = binding.local_addr();

        let shutdown = Arc::new(AtomicBool::new(false));
        let registry = ConnectionRegistry::new();

        let accept_thread = thread::Builder::new()
            .name(format!("mllp-accept-{}", local_addr.port()))
            .spawn({
                let config = config.clone();
                let shutdown = Arc::clone(&shutdown);
                let registry = registry.clone();
                move || accept_loop(binding, config, handler, acks, shutdown, registry)
            })
            .map_err(TransportError::Io)?;

        Ok(ServerHandle {
            local_addr,
            shutdown,
            registry,
            accept_thread: Some(accept_thread),
        })
    }
}

/// Handle to a running server endpoint.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    registry: ConnectionRegistry,
    accept_thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// The address the server is actually bound to (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently live connections.
    pub fn active_connections(&self) -> usize {
        self.registry.active()
    }

    /// Snapshot of live connection ids and peer addresses.
    pub fn connections(&self) -> Vec<(u64, SocketAddr)> {
        self.registry.snapshot()
    }

    /// Signal shutdown and join the accept loop. Idempotent.
    ///
    /// Workers are not joined here: each observes the shutdown flag at
    /// its next idle read tick and exits on its own.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.accept_thread.take() {
            if thread.join().is_err() {
                error!("accept loop panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    binding: TcpBinding,
    config: EndpointConfig,
    handler: Arc<dyn MessageHandler>,
    acks: Arc<dyn AckGenerator>,
    shutdown: Arc<AtomicBool>,
    registry: ConnectionRegistry,
) {
    let poll = config.response_timeout.min(ACCEPT_POLL_CAP);

    while !shutdown.load(Ordering::SeqCst) {
        match binding.accept() {
            Ok((stream, peer)) => {
                handle_accepted(stream, peer, &config, &handler, &acks, &shutdown, &registry);
            }
            Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(poll);
            }
            Err(err) => {
                warn!(%err, "accept failed");
                thread::sleep(poll);
            }
        }
    }

    info!(addr = %binding.local_addr(), "accept loop exiting");
}

fn handle_accepted(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: &EndpointConfig,
    handler: &Arc<dyn MessageHandler>,
    acks: &Arc<dyn AckGenerator>,
    shutdown: &Arc<AtomicBool>,
    registry: &ConnectionRegistry,
) {
    // Accepted sockets can inherit the listener's non-blocking mode on
    // some platforms; the workers want plain blocking reads with a
    // timeout.
    if let Err(err) = stream.set_nonblocking(false) {
        warn!(%peer, %err, "failed to switch connection to blocking mode");
        shutdown_stream(&stream);
        return;
    }
    config.socket_options().apply(&stream);

    let lead_byte = match probe(&mut stream) {
        Probe::Closed => {
            // Bare open/close, no data: a load-balancer liveness probe,
            // not a protocol client.
            debug!(%peer, "dropping connection with no data (liveness probe)");
            shutdown_stream(&stream);
            return;
        }
        Probe::Lead(byte) => Some(byte),
        Probe::Quiet => None,
        Probe::Failed(err) => {
            warn!(%peer, %err, "probe read failed, dropping connection");
            shutdown_stream(&stream);
            return;
        }
    };

    if let Err(err) = stream.set_read_timeout(Some(config.response_timeout)) {
        warn!(%peer, %err, "failed to set read timeout, dropping connection");
        shutdown_stream(&stream);
        return;
    }

    let guard = registry.register(peer);
    let conn_id = guard.id();
    let ctx = WorkerContext {
        stream,
        peer,
        config: config.clone(),
        handler: Arc::clone(handler),
        acks: Arc::clone(acks),
        shutdown: Arc::clone(shutdown),
        lead_byte,
    };

    let spawned = thread::Builder::new()
        .name(format!("mllp-conn-{conn_id}"))
        .spawn(move || worker::run(ctx, guard));
    if let Err(err) = spawned {
        error!(%peer, %err, "failed to spawn connection worker");
    }
}

enum Probe {
    /// Peer closed without sending anything.
    Closed,
    /// First byte of the stream, handed to the worker's reader.
    Lead(u8),
    /// Nothing arrived within the probe window; treat as a genuine
    /// client that has not spoken yet.
    Quiet,
    /// The probe read itself errored.
    Failed(std::io::Error),
}

/// Single bounded-timeout one-byte read immediately after accept.
fn probe(stream: &mut TcpStream) -> Probe {
    if let Err(err) = stream.set_read_timeout(Some(PROBE_READ_TIMEOUT)) {
        return Probe::Failed(err);
    }

    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Ok(0) => Probe::Closed,
        Ok(_) => Probe::Lead(byte[0]),
        Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
            Probe::Quiet
        }
        Err(err) => Probe::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use mllp_codec::{encode_frame, FrameReader};

    use super::*;
    use crate::ack::Hl7AckGenerator;
    use crate::client::MllpClient;
    use crate::handler::HandlerError;

    fn server_config() -> EndpointConfig {
        EndpointConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            response_timeout: Duration::from_millis(100),
            ..EndpointConfig::default()
        }
    }

    fn client_config(addr: SocketAddr) -> EndpointConfig {
        EndpointConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            connect_timeout: Duration::from_millis(1_000),
            response_timeout: Duration::from_millis(2_000),
            ..EndpointConfig::default()
        }
    }

    fn start_with(
        config: EndpointConfig,
        handler: impl MessageHandler + 'static,
    ) -> ServerHandle {
        MllpServer::start(config, Arc::new(handler), Arc::new(Hl7AckGenerator))
            .expect("server should start")
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn sequential_messages_acked_in_order() {
        let handler = |message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            let mut reply = b"ACK-".to_vec();
            reply.extend_from_slice(message);
            Ok(Some(reply))
        };
        let server = start_with(server_config(), handler);
        let mut client = MllpClient::new(client_config(server.local_addr()));

        for n in 0..5 {
            let message = format!("message-{n}");
            let ack = client.send(message.as_bytes()).unwrap().unwrap();
            assert_eq!(ack.as_ref(), format!("ACK-message-{n}").as_bytes());
        }
    }

    #[test]
    fn hl7_scenario_roundtrip() {
        let handler = |message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            assert!(message.starts_with(b"MSH|"));
            Ok(Some(b"MSA|AA|MSG00001".to_vec()))
        };
        let server = start_with(server_config(), handler);
        let mut client = MllpClient::new(client_config(server.local_addr()));

        let ack = client
            .send(b"MSH|^~\\&|HIS|RIH|EKG|EKG|20240101||ADT^A01|MSG00001|P|2.5\r")
            .unwrap()
            .unwrap();
        assert_eq!(ack.as_ref(), b"MSA|AA|MSG00001");
    }

    #[test]
    fn failing_handler_still_produces_error_ack() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Err("processing blew up".into())
        };
        let server = start_with(server_config(), handler);
        let mut client = MllpClient::new(client_config(server.local_addr()));

        let ack = client
            .send(b"MSH|^~\\&|A|B|C|D|||ADT^A01|CTRL77|P|2.5\r")
            .unwrap()
            .unwrap();
        let text = String::from_utf8(ack.to_vec()).unwrap();
        assert!(text.contains("MSA|AE|CTRL77"), "ack was: {text}");
    }

    #[test]
    fn auto_generated_ack_when_handler_returns_no_reply() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(None)
        };
        let server = start_with(server_config(), handler);
        let mut client = MllpClient::new(client_config(server.local_addr()));

        let ack = client
            .send(b"MSH|^~\\&|A|B|C|D|||ORU^R01|CTRL42|P|2.4\r")
            .unwrap()
            .unwrap();
        let text = String::from_utf8(ack.to_vec()).unwrap();
        assert!(text.contains("MSA|AA|CTRL42"), "ack was: {text}");
    }

    #[test]
    fn manual_ack_uses_reply_verbatim() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(Some(b"EXACT-BYTES".to_vec()))
        };
        let mut config = server_config();
        config.auto_ack = false;
        let server = start_with(config, handler);
        let mut client = MllpClient::new(client_config(server.local_addr()));

        let ack = client.send(b"anything").unwrap().unwrap();
        assert_eq!(ack.as_ref(), b"EXACT-BYTES");
    }

    #[test]
    fn manual_ack_without_reply_closes_connection() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(None)
        };
        let mut config = server_config();
        config.auto_ack = false;
        let server = start_with(config, handler);

        let mut client_cfg = client_config(server.local_addr());
        client_cfg.response_timeout = Duration::from_millis(300);
        let mut client = MllpClient::new(client_cfg);

        // The worker closes without answering: either the read times out
        // or the envelope reports the closed stream.
        let err = client.send(b"anything").unwrap_err();
        assert!(
            matches!(
                err,
                crate::EndpointError::ResponseTimeout(_) | crate::EndpointError::Envelope(_)
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn probe_connection_spawns_no_exchange() {
        let exchanges = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&exchanges);
        let handler = move |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        };
        let server = start_with(server_config(), handler);

        // Open and close without sending a byte, like a load-balancer
        // health check.
        let stream = TcpStream::connect(server.local_addr()).unwrap();
        drop(stream);

        thread::sleep(PROBE_READ_TIMEOUT + Duration::from_millis(200));
        assert_eq!(exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(server.active_connections(), 0);
    }

    #[test]
    fn quiet_client_is_still_served_after_probe_window() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(Some(b"late but served".to_vec()))
        };
        let server = start_with(server_config(), handler);

        let mut stream = TcpStream::connect(server.local_addr()).unwrap();
        thread::sleep(PROBE_READ_TIMEOUT + Duration::from_millis(100));

        let mut wire = bytes::BytesMut::new();
        encode_frame(b"delayed hello", &mut wire);
        stream.write_all(&wire).unwrap();

        let mut reader = FrameReader::new(stream);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"late but served");
    }

    #[test]
    fn out_of_band_noise_before_frame_is_tolerated() {
        let handler = |message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(Some(message.to_vec()))
        };
        let server = start_with(server_config(), handler);

        let mut stream = TcpStream::connect(server.local_addr()).unwrap();
        let mut wire = b"telnet-noise".to_vec();
        let mut framed = bytes::BytesMut::new();
        encode_frame(b"real message", &mut framed);
        wire.extend_from_slice(&framed);
        stream.write_all(&wire).unwrap();

        let mut reader = FrameReader::new(stream);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"real message");
    }

    #[test]
    fn registry_tracks_connection_lifecycle() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(None)
        };
        let server = start_with(server_config(), handler);

        let mut client = MllpClient::new(client_config(server.local_addr()));
        client.ensure_connected().unwrap();

        assert!(wait_until(Duration::from_secs(1), || {
            server.active_connections() == 1
        }));

        client.close();
        assert!(wait_until(Duration::from_secs(1), || {
            server.active_connections() == 0
        }));
    }

    #[test]
    fn stop_halts_accepting_and_workers_drain() {
        let handler = |_message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(None)
        };
        let mut server = start_with(server_config(), handler);
        let addr = server.local_addr();

        let mut client = MllpClient::new(client_config(addr));
        client.ensure_connected().unwrap();
        assert!(wait_until(Duration::from_secs(1), || {
            server.active_connections() == 1
        }));

        let start = Instant::now();
        server.stop();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "stop should return within one accept poll cycle"
        );

        // The idle worker observes the flag at its next read tick.
        assert!(wait_until(Duration::from_secs(1), || {
            server.active_connections() == 0
        }));

        // The listening socket is gone; fresh connects must fail.
        assert!(wait_until(Duration::from_secs(1), || {
            TcpStream::connect(addr).is_err()
        }));
    }

    #[test]
    fn concurrent_connections_do_not_cross_talk() {
        let handler = |message: &[u8]| -> std::result::Result<Option<Vec<u8>>, HandlerError> {
            Ok(Some(message.to_vec()))
        };
        let server = start_with(server_config(), handler);
        let addr = server.local_addr();

        let clients: Vec<_> = (0..4)
            .map(|n| {
                thread::spawn(move || {
                    let mut client = MllpClient::new(client_config(addr));
                    for round in 0..3 {
                        let message = format!("client-{n}-round-{round}");
                        let ack = client.send(message.as_bytes()).unwrap().unwrap();
                        assert_eq!(ack.as_ref(), message.as_bytes());
                    }
                })
            })
            .collect();

        for client in clients {
            client.join().unwrap();
        }
    }
}
