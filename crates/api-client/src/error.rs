//! Error taxonomy for the Request API driver.

use std::time::Duration;

use thiserror::Error;

use protocol::OutcomeStatus;

/// Errors that can occur while driving a request through the API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The API rejected a submission or was unreachable at submit time.
    #[error("submission failed: {reason}")]
    Submission { reason: String },

    /// The translation service rejected the phrase or returned nothing.
    #[error("translation failed: {reason}")]
    Translation { reason: String },

    /// A status poll failed. Transient faults are retried by the polling
    /// loop up to the deadline; fatal ones surface immediately.
    #[error("status poll failed for request {uid}: {reason}")]
    Poll {
        uid: String,
        reason: String,
        transient: bool,
    },

    /// The deadline elapsed before the request reached a terminal state.
    #[error("request {uid} did not reach a terminal state within {max_wait:?}")]
    Timeout { uid: String, max_wait: Duration },

    /// The pipeline reported a render failure; never retried.
    #[error("rendering failed for request {uid}")]
    RenderFailed { uid: String },

    /// Fetching or writing the finished artifact failed.
    #[error("download failed for request {uid}: {reason}")]
    Download { uid: String, reason: String },
}

impl ApiError {
    /// How this failure is recorded in the manifest.
    pub fn outcome(&self) -> OutcomeStatus {
        match self {
            ApiError::Timeout { .. } => OutcomeStatus::Timeout,
            _ => OutcomeStatus::Failed,
        }
    }
}
