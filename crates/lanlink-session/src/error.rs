use std::path::PathBuf;
use std::time::Duration;

use lanlink_proto::OperationType;

/// Errors that can occur in a backend session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] lanlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] lanlink_frame::FrameError),

    /// Request body could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No response arrived within the deadline. The operation's ultimate
    /// outcome on the backend side is unknown.
    #[error("no response to {operation} within {timeout:?}")]
    Timeout {
        operation: OperationType,
        timeout: Duration,
    },

    /// The link to the backend went away while the request was in flight.
    #[error("transport closed: {reason}")]
    TransportClosed { reason: String },

    /// The backend executable is missing or unlaunchable. Fatal for the
    /// session; readiness never reaches true.
    #[error("failed to launch backend {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
}

impl SessionError {
    pub(crate) fn closed(reason: impl Into<String>) -> Self {
        SessionError::TransportClosed {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
