//! HTTP driver for the video Request API.
//!
//! This crate gives the submission client a typed interface over the
//! external API: submit a phrase, poll its status with capped jittered
//! backoff until a terminal state or a hard deadline, and download the
//! finished artifact. Every call carries the configured request timeout so
//! one unresponsive dependency cannot stall a whole batch.
//!
//! The text-to-gloss translation service is driven through the same client
//! when a translation endpoint is configured.

use std::path::Path;
use std::time::Instant;

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use protocol::{ApiConfig, PollConfig, RequestStatus};

mod backoff;
mod error;

pub use error::ApiError;

#[derive(Serialize)]
struct SubmitBody<'a> {
    phrase: &'a str,
    variant: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: RequestStatus,
}

/// Client for the Request API and the translation service.
#[derive(Clone)]
pub struct VideoApiClient {
    http: Client,
    base_url: String,
    translate_url: Option<String>,
    token: String,
}

impl VideoApiClient {
    /// Build a client from the API configuration.
    pub fn new(cfg: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ApiError::Submission {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(VideoApiClient {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            translate_url: cfg
                .translate_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            token: cfg.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Translate a phrase into gloss via the configured translation
    /// endpoint. The response body is the gloss as plain text.
    pub async fn translate(&self, text: &str) -> Result<String, ApiError> {
        let base = self.translate_url.as_ref().ok_or_else(|| ApiError::Translation {
            reason: "no translation endpoint configured".into(),
        })?;
        let url = format!("{base}/translate");
        let resp = self
            .http
            .post(&url)
            .json(&TranslateBody { text })
            .send()
            .await
            .map_err(|e| ApiError::Translation {
                reason: format!("request to {url} failed: {e}"),
            })?;
        let code = resp.status();
        if !code.is_success() {
            return Err(ApiError::Translation {
                reason: format!("{url} returned {code}"),
            });
        }
        let gloss = resp
            .text()
            .await
            .map_err(|e| ApiError::Translation {
                reason: format!("unreadable response body: {e}"),
            })?
            .trim()
            .to_string();
        if gloss.is_empty() {
            return Err(ApiError::Translation {
                reason: "translation service returned an empty gloss".into(),
            });
        }
        debug!(gloss = %gloss, "translated phrase");
        Ok(gloss)
    }

    /// Create a request for `phrase` and return the id the API assigned.
    pub async fn submit(&self, phrase: &str, variant: &str) -> Result<String, ApiError> {
        let url = self.url("submit");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&SubmitBody { phrase, variant })
            .send()
            .await
            .map_err(|e| ApiError::Submission {
                reason: format!("request to {url} failed: {e}"),
            })?;
        let code = resp.status();
        if !code.is_success() {
            return Err(ApiError::Submission {
                reason: format!("{url} returned {code}"),
            });
        }
        let body: SubmitResponse = resp.json().await.map_err(|e| ApiError::Submission {
            reason: format!("malformed response from {url}: {e}"),
        })?;
        if body.id.trim().is_empty() {
            return Err(ApiError::Submission {
                reason: format!("{url} returned an empty request id"),
            });
        }
        info!(uid = %body.id, "request submitted");
        Ok(body.id)
    }

    /// One status poll. Connection faults, 5xx and 429 are transient;
    /// any other non-success response is fatal.
    pub async fn status(&self, uid: &str) -> Result<RequestStatus, ApiError> {
        let url = self.url(&format!("status/{uid}"));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Poll {
                uid: uid.to_string(),
                reason: format!("request to {url} failed: {e}"),
                transient: true,
            })?;
        let code = resp.status();
        if code.is_server_error() || code == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::Poll {
                uid: uid.to_string(),
                reason: format!("{url} returned {code}"),
                transient: true,
            });
        }
        if !code.is_success() {
            return Err(ApiError::Poll {
                uid: uid.to_string(),
                reason: format!("{url} returned {code}"),
                transient: false,
            });
        }
        let body: StatusResponse = resp.json().await.map_err(|e| ApiError::Poll {
            uid: uid.to_string(),
            reason: format!("malformed response from {url}: {e}"),
            transient: false,
        })?;
        Ok(body.status)
    }

    /// Poll until the request reaches a terminal state or `poll.max_wait`
    /// elapses.
    ///
    /// Sleeps between attempts with capped jittered backoff; transient poll
    /// faults are retried within the deadline. Returns the terminal status
    /// (`Generated`), or `RenderFailed` / `Timeout` / a fatal `Poll` error.
    pub async fn await_completion(
        &self,
        uid: &str,
        poll: &PollConfig,
    ) -> Result<RequestStatus, ApiError> {
        let started = Instant::now();
        let deadline = started + poll.max_wait;
        let mut delay = poll.interval;

        loop {
            match self.status(uid).await {
                Ok(RequestStatus::Generated) => {
                    info!(uid = %uid, elapsed = ?started.elapsed(), "request generated");
                    return Ok(RequestStatus::Generated);
                }
                Ok(RequestStatus::Failed) => {
                    return Err(ApiError::RenderFailed {
                        uid: uid.to_string(),
                    })
                }
                Ok(status) => {
                    debug!(uid = %uid, status = %status, "request still in flight");
                }
                Err(ApiError::Poll {
                    transient: true,
                    ref reason,
                    ..
                }) => {
                    warn!(uid = %uid, reason = %reason, "transient poll failure, will retry");
                }
                Err(fatal) => return Err(fatal),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ApiError::Timeout {
                    uid: uid.to_string(),
                    max_wait: poll.max_wait,
                });
            }
            let sleep_for = backoff::jittered(delay).min(deadline - now);
            tokio::time::sleep(sleep_for).await;
            delay = backoff::next_delay(delay, poll.max_interval);
        }
    }

    /// Fetch the finished artifact and write it to `dest`, streaming the
    /// body chunk by chunk so large videos never sit whole in memory.
    ///
    /// Only call this after `await_completion` reported `Generated`; that
    /// status is the one trustworthy download signal.
    pub async fn download(&self, uid: &str, dest: &Path) -> Result<(), ApiError> {
        let url = self.url(&format!("download/{uid}"));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Download {
                uid: uid.to_string(),
                reason: format!("request to {url} failed: {e}"),
            })?;
        let code = resp.status();
        if !code.is_success() {
            return Err(ApiError::Download {
                uid: uid.to_string(),
                reason: format!("{url} returned {code}"),
            });
        }
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ApiError::Download {
                        uid: uid.to_string(),
                        reason: format!("failed creating {}: {e}", parent.display()),
                    })?;
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ApiError::Download {
                uid: uid.to_string(),
                reason: format!("failed creating {}: {e}", dest.display()),
            })?;
        let mut stream = resp.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Download {
                uid: uid.to_string(),
                reason: format!("failed reading body: {e}"),
            })?;
            file.write_all(&chunk).await.map_err(|e| ApiError::Download {
                uid: uid.to_string(),
                reason: format!("failed writing {}: {e}", dest.display()),
            })?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| ApiError::Download {
            uid: uid.to_string(),
            reason: format!("failed writing {}: {e}", dest.display()),
        })?;
        info!(uid = %uid, bytes = written, dest = %dest.display(), "artifact downloaded");
        Ok(())
    }
}
