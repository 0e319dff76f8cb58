//! Error types for the relay crate.

use thiserror::Error;

/// Internal relay faults. None of these silently drop a message: permanent
/// faults are logged loudly before acking, everything else is requeued.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("broker rejected publish to queue {queue}")]
    PublishRejected { queue: String },

    #[error("request store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("malformed message: {0}")]
    Malformed(#[from] protocol::MessageError),

    #[error("completion for request {uid} names no artifact and no error")]
    MissingArtifactPath { uid: String },

    #[error("artifact not found at {path}")]
    ArtifactMissing { path: String },

    #[error("artifact copy failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("consumer stream for queue {queue} closed")]
    ConsumerClosed { queue: String },
}

impl RelayError {
    /// Whether broker redelivery could possibly succeed where this attempt
    /// failed. Parse failures cannot be repaired by redelivery; everything
    /// else is worth retrying.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            RelayError::Malformed(_) | RelayError::MissingArtifactPath { .. }
        )
    }
}
