//! Queue message envelopes.
//!
//! The ingress relay must forward submission messages byte-for-byte, so its
//! parsing is deliberately minimal: [`peek_uid`] extracts the request id and
//! nothing else, and the original payload travels on unchanged. Completion
//! messages carry the rendered artifact location and resolve their uid from
//! the AMQP correlation id first, with the payload field as fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Faults while decoding a queue message.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message has no usable request id")]
    MissingUid,
}

/// Submission envelope placed on the inbound queue by the Request API.
///
/// Extra fields are preserved so the relay can republish without knowing
/// the full schema the rendering pipeline expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMessage {
    pub uid: String,
    #[serde(flatten)]
    pub payload: Value,
}

impl SubmissionMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Extract the request id from a raw submission payload without touching
/// the rest of the message.
pub fn peek_uid(payload: &[u8]) -> Result<String, MessageError> {
    let value: Value = serde_json::from_slice(payload)?;
    match value.get("uid").and_then(Value::as_str) {
        Some(uid) if !uid.trim().is_empty() => Ok(uid.trim().to_string()),
        _ => Err(MessageError::MissingUid),
    }
}

/// Completion notification produced by the rendering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Request id; may be absent when carried via the correlation id.
    #[serde(default)]
    pub uid: Option<String>,

    /// Where the renderer left the artifact, absent on failure.
    #[serde(default)]
    pub artifact_path: Option<String>,

    /// Present when the pipeline reports a render failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl CompletionMessage {
    /// Decode a completion payload and resolve its request id.
    ///
    /// The correlation id set by the ingress relay wins over the payload
    /// field so a renderer that echoes neither is still resolvable.
    pub fn parse(payload: &[u8], correlation_id: Option<&str>) -> Result<(String, Self), MessageError> {
        let msg: CompletionMessage = serde_json::from_slice(payload)?;
        let uid = correlation_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| {
                msg.uid
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .ok_or(MessageError::MissingUid)?;
        Ok((uid, msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_uid_reads_only_the_uid() {
        let payload = br#"{"uid":"abc-123","mix":false,"playerOptions":{"speed":1.0}}"#;
        assert_eq!(peek_uid(payload).unwrap(), "abc-123");
    }

    #[test]
    fn peek_uid_rejects_missing_or_blank_uid() {
        assert!(matches!(
            peek_uid(br#"{"mix":true}"#),
            Err(MessageError::MissingUid)
        ));
        assert!(matches!(
            peek_uid(br#"{"uid":"   "}"#),
            Err(MessageError::MissingUid)
        ));
    }

    #[test]
    fn peek_uid_rejects_garbage() {
        assert!(matches!(
            peek_uid(b"not json at all"),
            Err(MessageError::InvalidJson(_))
        ));
    }

    #[test]
    fn submission_round_trip_preserves_extra_fields() {
        let payload = br#"{"uid":"u1","subtitle":"http://bridge/u1.srt","mix":true}"#;
        let msg: SubmissionMessage = serde_json::from_slice(payload).unwrap();
        assert_eq!(msg.uid, "u1");
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(peek_uid(&bytes).unwrap(), "u1");
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["subtitle"], "http://bridge/u1.srt");
        assert_eq!(value["mix"], true);
    }

    #[test]
    fn completion_prefers_correlation_id() {
        let payload = br#"{"uid":"payload-uid","artifact_path":"/tmp/x.mp4"}"#;
        let (uid, msg) = CompletionMessage::parse(payload, Some("corr-uid")).unwrap();
        assert_eq!(uid, "corr-uid");
        assert_eq!(msg.artifact_path.as_deref(), Some("/tmp/x.mp4"));
    }

    #[test]
    fn completion_falls_back_to_payload_uid() {
        let payload = br#"{"uid":"payload-uid"}"#;
        let (uid, _) = CompletionMessage::parse(payload, None).unwrap();
        assert_eq!(uid, "payload-uid");
        let (uid, _) = CompletionMessage::parse(payload, Some("  ")).unwrap();
        assert_eq!(uid, "payload-uid");
    }

    #[test]
    fn completion_without_any_uid_is_an_error() {
        let payload = br#"{"artifact_path":"/tmp/x.mp4"}"#;
        assert!(matches!(
            CompletionMessage::parse(payload, None),
            Err(MessageError::MissingUid)
        ));
    }
}
