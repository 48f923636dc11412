/// Errors that can occur while reading or writing MLLP frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The connection was closed before any byte of a frame was received.
    ///
    /// This is the clean-disconnect case: the peer hung up between
    /// messages, not in the middle of one.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended after reading had begun but before the frame
    /// completed (mid-payload, after out-of-band bytes, or with the end
    /// sequence unfinished).
    #[error("stream ended mid-frame")]
    Truncated,

    /// A second start marker appeared before the end sequence.
    #[error("unexpected start marker inside frame")]
    UnexpectedStartMarker,

    /// The end marker was not immediately followed by its companion byte.
    #[error("end marker not followed by 0x0D (found 0x{found:02X})")]
    BrokenEndMarker { found: u8 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The socket read timed out. `in_frame` is true when the timeout
    /// struck after the start marker had been consumed: the peer stalled
    /// mid-message rather than simply staying quiet.
    #[error("read timed out (in frame: {in_frame})")]
    ReadTimeout { in_frame: bool },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
