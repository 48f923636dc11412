use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{FrameConfig, CARRIAGE_RETURN, END_BLOCK, START_BLOCK};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete MLLP frames from any `Read` stream.
///
/// Blocking, one frame per call. The internal buffer belongs to the
/// connection this reader wraps: bytes over-read past one frame boundary
/// are the start of the next frame and are consumed by the next call.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Prepend a byte obtained out-of-band (the listener's post-accept
    /// probe read) so it is decoded as the first byte of the stream.
    pub fn prime(&mut self, byte: u8) {
        let mut primed = BytesMut::with_capacity(self.buf.len() + 1);
        primed.extend_from_slice(&[byte]);
        primed.extend_from_slice(&self.buf);
        self.buf = primed;
    }

    /// Read the next complete frame payload (blocking).
    ///
    /// Bytes preceding the start marker are out-of-band noise: drained,
    /// counted, and logged, never an error. Returns
    /// [`FrameError::ConnectionClosed`] on EOF between frames and
    /// [`FrameError::Truncated`] on EOF once reading has begun.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let mut discarded = 0usize;
        let mut started = false;
        let mut scanned = 0usize;

        loop {
            if !started {
                match self.buf.iter().position(|&b| b == START_BLOCK) {
                    Some(pos) => {
                        discarded += pos;
                        self.buf.advance(pos + 1);
                        started = true;
                        scanned = 0;
                    }
                    None => {
                        discarded += self.buf.len();
                        self.buf.clear();
                    }
                }
            }

            if started {
                while scanned < self.buf.len() {
                    match self.buf[scanned] {
                        START_BLOCK => return Err(FrameError::UnexpectedStartMarker),
                        END_BLOCK => {
                            if scanned + 1 >= self.buf.len() {
                                break; // companion byte not buffered yet
                            }
                            let next = self.buf[scanned + 1];
                            if next != CARRIAGE_RETURN {
                                return Err(FrameError::BrokenEndMarker { found: next });
                            }
                            let payload = self.buf.split_to(scanned).freeze();
                            self.buf.advance(2);
                            if discarded > 0 {
                                debug!(discarded, "discarded out-of-band bytes before frame");
                            }
                            return Ok(payload);
                        }
                        _ => {
                            scanned += 1;
                            if scanned > self.config.max_payload_size {
                                return Err(FrameError::PayloadTooLarge {
                                    size: scanned,
                                    max: self.config.max_payload_size,
                                });
                            }
                        }
                    }
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(FrameError::ReadTimeout { in_frame: started });
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if started || discarded > 0 {
                    return Err(FrameError::Truncated);
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
