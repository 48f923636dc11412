use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mllp_codec::{FrameError, FrameReader, FrameWriter};
use mllp_transport::shutdown_stream;
use tracing::{debug, error, warn};

use crate::ack::{AckGenerator, AckStatus};
use crate::config::EndpointConfig;
use crate::handler::MessageHandler;
use crate::registry::ConnectionGuard;

/// Everything a connection worker needs, handed over by the accept loop.
pub(crate) struct WorkerContext {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub config: EndpointConfig,
    pub handler: Arc<dyn MessageHandler>,
    pub acks: Arc<dyn AckGenerator>,
    pub shutdown: Arc<AtomicBool>,
    /// Byte consumed by the accept loop's probe read, if any.
    pub lead_byte: Option<u8>,
}

/// Per-connection loop: one iteration per inbound message.
///
/// Reads a frame, invokes the handler synchronously, writes the
/// acknowledgement back, repeats until the peer disconnects, the stream
/// corrupts, or the listener signals shutdown. Any framing error other
/// than an idle-wait timeout closes the connection: after corrupt input
/// the stream position can no longer be trusted.
pub(crate) fn run(ctx: WorkerContext, guard: ConnectionGuard) {
    let conn_id = guard.id();
    let peer = ctx.peer;

    let read_half = match ctx.stream.try_clone() {
        Ok(stream) => stream,
        Err(err) => {
            error!(conn_id, %peer, %err, "failed to clone stream for reading");
            shutdown_stream(&ctx.stream);
            return;
        }
    };

    let mut reader = FrameReader::with_config(read_half, ctx.config.frame_config());
    let mut writer = FrameWriter::with_config(ctx.stream, ctx.config.frame_config());
    if let Some(byte) = ctx.lead_byte {
        reader.prime(byte);
    }

    while !ctx.shutdown.load(Ordering::SeqCst) {
        let message = match reader.read_frame() {
            Ok(message) => message,
            Err(FrameError::ReadTimeout { in_frame: false }) => {
                // Idle connection; nothing in flight. Re-check shutdown
                // and keep waiting.
                continue;
            }
            Err(FrameError::ReadTimeout { in_frame: true }) => {
                warn!(
                    conn_id, %peer,
                    timeout = ?ctx.config.response_timeout,
                    "request stalled mid-frame, closing connection"
                );
                break;
            }
            Err(FrameError::ConnectionClosed) => {
                debug!(conn_id, %peer, "peer disconnected");
                break;
            }
            Err(err) => {
                warn!(conn_id, %peer, %err, "framing error, closing connection");
                break;
            }
        };

        let outcome = ctx.handler.handle(&message);
        if let Err(err) = &outcome {
            debug!(conn_id, %peer, %err, "handler reported failure");
        }

        let ack = if ctx.config.auto_ack {
            match &outcome {
                Ok(Some(reply)) => reply.clone(),
                Ok(None) => ctx.acks.generate(&message, AckStatus::Accept),
                Err(_) => ctx.acks.generate(&message, AckStatus::Error),
            }
        } else {
            match outcome {
                Ok(Some(reply)) => reply,
                Ok(None) | Err(_) => {
                    error!(
                        conn_id, %peer,
                        "auto-ack disabled and handler supplied no reply body, closing connection"
                    );
                    break;
                }
            }
        };

        if let Err(err) = writer.write_frame(&ack) {
            warn!(conn_id, %peer, %err, "failed to write acknowledgement, closing connection");
            break;
        }
    }

    shutdown_stream(writer.get_ref());
    debug!(conn_id, %peer, "connection worker exiting");
}
