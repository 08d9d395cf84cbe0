/// Errors that end a location cycle early.
///
/// Device-reported failures are not errors: they surface as
/// [`CycleOutcome::Aborted`](crate::CycleOutcome::Aborted).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] dwmtlv_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] dwmtlv_frame::FrameError),
}

impl ClientError {
    /// True when the connection must be reopened before another cycle can run.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Frame(err) => err.is_connection_lost(),
        }
    }

    /// True for a cancelled read, whether or not it left the stream mid-frame.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ClientError::Frame(dwmtlv_frame::FrameError::Cancelled { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
