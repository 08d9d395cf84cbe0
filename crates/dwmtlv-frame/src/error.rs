/// Errors that can occur while exchanging TLV frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The request could not be written to the device.
    #[error("failed to write request frame: {0}")]
    WriteFailed(std::io::Error),

    /// The stream ended inside a frame.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// The device went away before a frame started.
    #[error("device disconnected")]
    Disconnected,

    /// The per-frame deadline elapsed.
    #[error("timed out waiting for frame (partial: {partial})")]
    TimedOut { partial: bool },

    /// The cancellation token was tripped. `partial` is set when frame bytes
    /// had already been consumed.
    #[error("frame read cancelled (partial: {partial})")]
    Cancelled { partial: bool },

    /// A value longer than a 1-byte length field can describe.
    #[error("value too large ({size} bytes, max {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True when frame bytes were consumed before the failure, leaving the
    /// stream positioned somewhere inside a frame.
    ///
    /// The connection cannot be resynchronised reliably afterwards and must be reopened.
    pub fn desynchronizes(&self) -> bool {
        matches!(
            self,
            FrameError::ShortRead { .. }
                | FrameError::TimedOut { partial: true }
                | FrameError::Cancelled { partial: true }
        )
    }

    /// True when the connection is gone or unusable and has to be reopened.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            FrameError::Disconnected => true,
            FrameError::WriteFailed(err) | FrameError::Io(err) => is_disconnect(err),
            other => other.desynchronizes(),
        }
    }
}

/// I/O failures that mean the device itself went away.
pub(crate) fn is_disconnect(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    if matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    ) {
        return true;
    }
    // EIO, ENXIO and ENODEV are what a tty reports once its USB device is gone.
    matches!(err.raw_os_error(), Some(5) | Some(6) | Some(19))
}

pub type Result<T> = std::result::Result<T, FrameError>;
