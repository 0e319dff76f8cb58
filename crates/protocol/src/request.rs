//! Request status machine and persisted request record.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a rendering request.
///
/// Transitions are monotonic: `Queued -> Processing -> Generated | Failed`.
/// Once a request reaches a terminal state it never moves again; the
/// completion relay relies on this to make redelivered notifications
/// converge instead of flip-flopping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Queued,
    Processing,
    Generated,
    Failed,
}

impl RequestStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Generated | RequestStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic order.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Queued, Processing) | (Queued, Generated) | (Queued, Failed) => true,
            (Processing, Generated) | (Processing, Failed) => true,
            _ => false,
        }
    }

    /// Stable lowercase name, used for database binding and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Processing => "processing",
            RequestStatus::Generated => "generated",
            RequestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(RequestStatus::Queued),
            "processing" => Ok(RequestStatus::Processing),
            "generated" => Ok(RequestStatus::Generated),
            "failed" => Ok(RequestStatus::Failed),
            other => Err(format!("unknown request status: {other:?}")),
        }
    }
}

/// Persisted request row as seen by the completion relay.
///
/// Owned by the Request API; the relay only ever mutates `status` and
/// `video_path`, and only via a conditional non-terminal -> terminal update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub uid: String,
    pub phrase: String,
    pub variant: String,
    pub status: RequestStatus,
    pub video_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

/// Final outcome recorded in the manifest for one phrase.
///
/// `Timeout` is a client-side outcome (the deadline elapsed while the
/// request was still in flight), not a request state the pipeline reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Generated,
    Failed,
    Timeout,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Generated => "generated",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_do_not_transition() {
        assert!(!RequestStatus::Generated.can_transition_to(RequestStatus::Processing));
        assert!(!RequestStatus::Generated.can_transition_to(RequestStatus::Failed));
        assert!(!RequestStatus::Failed.can_transition_to(RequestStatus::Generated));
        assert!(!RequestStatus::Failed.can_transition_to(RequestStatus::Queued));
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(RequestStatus::Queued.can_transition_to(RequestStatus::Processing));
        assert!(RequestStatus::Queued.can_transition_to(RequestStatus::Generated));
        assert!(RequestStatus::Processing.can_transition_to(RequestStatus::Generated));
        assert!(RequestStatus::Processing.can_transition_to(RequestStatus::Failed));
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!RequestStatus::Processing.can_transition_to(RequestStatus::Queued));
        assert!(!RequestStatus::Queued.can_transition_to(RequestStatus::Queued));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            RequestStatus::Queued,
            RequestStatus::Processing,
            RequestStatus::Generated,
            RequestStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>(), Ok(status));
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Generated).unwrap();
        assert_eq!(json, "\"generated\"");
        let back: RequestStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(back, RequestStatus::Processing);
    }
}
