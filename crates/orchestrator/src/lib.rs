//! Batch orchestration for the submission client.
//!
//! Coordinates the full lifecycle of each phrase:
//! 1. Skip phrases the manifest already records as generated
//! 2. Translate to gloss (when a translation endpoint is configured)
//! 3. Submit to the Request API
//! 4. Poll until terminal or deadline
//! 5. Download the artifact
//! 6. Append the manifest entry
//!
//! Phrase lifecycles run concurrently up to a bounded limit, and are
//! independent: one failure never aborts the rest. Every phrase ends in
//! exactly one recorded outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use api_client::{ApiError, VideoApiClient};
use manifest::{ManifestEntry, ManifestWriter};
use phrase_loader::{output_filename, Phrase};
use protocol::{OutcomeStatus, PollConfig};

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub poll: PollConfig,
    pub out_dir: PathBuf,
    pub variant: String,
    pub concurrency: usize,
    /// Translate phrases to gloss before submitting.
    pub translate: bool,
}

/// Final state of one phrase after the batch.
#[derive(Debug)]
pub enum Outcome {
    /// The full lifecycle succeeded in this run.
    Generated { uid: String, path: PathBuf },
    /// A previous run already completed this phrase; nothing re-submitted.
    AlreadyRecorded { path: Option<PathBuf> },
    /// The lifecycle stopped short; `status` is what the manifest records.
    Failed {
        uid: Option<String>,
        status: OutcomeStatus,
        reason: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Generated { .. } | Outcome::AlreadyRecorded { .. })
    }
}

/// One phrase paired with how it ended, in input order.
#[derive(Debug)]
pub struct PhraseOutcome {
    pub phrase: Phrase,
    pub outcome: Outcome,
}

/// Everything that happened in one batch.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<PhraseOutcome>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PhraseOutcome> {
        self.outcomes.iter().filter(|o| !o.outcome.is_success())
    }
}

/// Drives a batch of phrases through the pipeline.
pub struct Orchestrator {
    client: VideoApiClient,
    manifest: Arc<ManifestWriter>,
    opts: BatchOptions,
}

impl Orchestrator {
    pub fn new(client: VideoApiClient, manifest: Arc<ManifestWriter>, opts: BatchOptions) -> Self {
        Orchestrator {
            client,
            manifest,
            opts,
        }
    }

    /// Run every phrase to a recorded outcome and report them in order.
    pub async fn run_batch(&self, phrases: Vec<Phrase>) -> Result<BatchReport> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&self.opts.out_dir)
            .await
            .with_context(|| format!("creating output dir {}", self.opts.out_dir.display()))?;

        let completed = manifest::load_completed(self.manifest.path())
            .context("reading existing manifest")?;
        let semaphore = Arc::new(Semaphore::new(self.opts.concurrency));

        let total = phrases.len();
        let mut slots: Vec<Option<PhraseOutcome>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let mut handles = Vec::new();

        for (index, phrase) in phrases.into_iter().enumerate() {
            if let Some(prior) = completed.get(&phrase.normalized) {
                info!(phrase = %phrase.text, "already generated in a previous run, skipping");
                slots[index] = Some(PhraseOutcome {
                    phrase,
                    outcome: Outcome::AlreadyRecorded {
                        path: prior.path.clone(),
                    },
                });
                continue;
            }

            let client = self.client.clone();
            let manifest = self.manifest.clone();
            let semaphore = semaphore.clone();
            let opts = self.opts.clone();
            let task_phrase = phrase.clone();
            handles.push((
                index,
                phrase,
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return Outcome::Failed {
                                uid: None,
                                status: OutcomeStatus::Failed,
                                reason: "worker pool shut down".into(),
                            }
                        }
                    };
                    run_phrase(client, manifest, task_phrase, index, opts).await
                }),
            ));
        }

        for (index, phrase, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(phrase = %phrase.text, error = %e, "phrase task panicked");
                    Outcome::Failed {
                        uid: None,
                        status: OutcomeStatus::Failed,
                        reason: format!("task panicked: {e}"),
                    }
                }
            };
            slots[index] = Some(PhraseOutcome { phrase, outcome });
        }

        let outcomes: Vec<PhraseOutcome> = slots.into_iter().flatten().collect();
        let report = BatchReport { outcomes };
        info!(
            total,
            succeeded = report.success_count(),
            elapsed = ?started.elapsed(),
            "batch finished"
        );
        Ok(report)
    }
}

/// One phrase's full lifecycle, ending in a manifest append either way.
async fn run_phrase(
    client: VideoApiClient,
    manifest: Arc<ManifestWriter>,
    phrase: Phrase,
    index: usize,
    opts: BatchOptions,
) -> Outcome {
    info!(phrase = %phrase.text, "starting phrase lifecycle");
    match drive(&client, &phrase, index, &opts).await {
        Ok((uid, path)) => {
            let entry = ManifestEntry::new(
                &phrase.normalized,
                Some(uid.clone()),
                OutcomeStatus::Generated,
                Some(path.clone()),
            );
            match manifest.append(&entry) {
                Ok(()) => Outcome::Generated { uid, path },
                Err(e) => Outcome::Failed {
                    uid: Some(uid),
                    status: OutcomeStatus::Failed,
                    reason: format!("video saved to {} but manifest append failed: {e}", path.display()),
                },
            }
        }
        Err((uid, api_err)) => {
            warn!(phrase = %phrase.text, error = %api_err, "phrase lifecycle failed");
            let status = api_err.outcome();
            let entry = ManifestEntry::new(&phrase.normalized, uid.clone(), status, None);
            if let Err(e) = manifest.append(&entry) {
                error!(phrase = %phrase.text, error = %e, "failed to record failure in manifest");
            }
            Outcome::Failed {
                uid,
                status,
                reason: api_err.to_string(),
            }
        }
    }
}

async fn drive(
    client: &VideoApiClient,
    phrase: &Phrase,
    index: usize,
    opts: &BatchOptions,
) -> std::result::Result<(String, PathBuf), (Option<String>, ApiError)> {
    let text = if opts.translate {
        client
            .translate(&phrase.text)
            .await
            .map_err(|e| (None, e))?
    } else {
        phrase.text.clone()
    };

    let uid = client
        .submit(&text, &opts.variant)
        .await
        .map_err(|e| (None, e))?;

    client
        .await_completion(&uid, &opts.poll)
        .await
        .map_err(|e| (Some(uid.clone()), e))?;

    let dest = opts.out_dir.join(output_filename(index + 1, &phrase.text));
    client
        .download(&uid, &dest)
        .await
        .map_err(|e| (Some(uid.clone()), e))?;

    Ok((uid, dest))
}
