//! Completion relay: rendered-artifact notifications -> durable storage +
//! terminal status.

use std::path::Path;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use tracing::{debug, error, info, warn};

use protocol::{BrokerConfig, CompletionMessage, RequestStatus};

use crate::artifacts::ArtifactStore;
use crate::broker::Broker;
use crate::error::RelayError;
use crate::store::{RequestStore, TerminalUpdate};

/// What to do with a delivery after handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
}

/// Pure per-message logic of the completion relay, separated from the
/// broker loop so it can be exercised directly.
///
/// Ordering is the consistency mechanism here: the artifact copy strictly
/// precedes the status update, so a `generated` status always implies the
/// file is in place. Both steps are safe to repeat, which makes broker
/// redelivery after a partial failure converge.
pub struct CompletionHandler<S> {
    store: S,
    artifacts: ArtifactStore,
}

impl<S: RequestStore> CompletionHandler<S> {
    pub fn new(store: S, artifacts: ArtifactStore) -> Self {
        CompletionHandler { store, artifacts }
    }

    /// Handle one completion notification.
    ///
    /// `Ok(Requeue)` covers transient situations (request row not yet
    /// visible, artifact not yet on disk); `Err` covers faults, of which
    /// only the permanent ones should be acked by the caller.
    pub async fn handle(
        &self,
        correlation_id: Option<&str>,
        payload: &[u8],
    ) -> Result<Disposition, RelayError> {
        let (uid, msg) = CompletionMessage::parse(payload, correlation_id)?;

        if let Some(reason) = &msg.error {
            warn!(uid = %uid, reason = %reason, "pipeline reported render failure");
            return self.apply(&uid, RequestStatus::Failed, None).await;
        }

        let source = msg
            .artifact_path
            .as_deref()
            .ok_or_else(|| RelayError::MissingArtifactPath { uid: uid.clone() })?;

        let dest = match self.artifacts.place(&uid, Path::new(source)).await {
            Ok(dest) => dest,
            Err(RelayError::ArtifactMissing { path }) => {
                // The renderer's file may not be visible yet.
                warn!(uid = %uid, path = %path, "artifact not found, requeueing");
                return Ok(Disposition::Requeue);
            }
            Err(e) => return Err(e),
        };

        self.apply(&uid, RequestStatus::Generated, Some(&dest)).await
    }

    async fn apply(
        &self,
        uid: &str,
        status: RequestStatus,
        video_path: Option<&Path>,
    ) -> Result<Disposition, RelayError> {
        match self.store.mark_terminal(uid, status, video_path).await? {
            TerminalUpdate::Applied => {
                info!(uid = %uid, status = %status, "request resolved");
                Ok(Disposition::Ack)
            }
            TerminalUpdate::AlreadyTerminal => {
                debug!(uid = %uid, "request already terminal, redelivery converged");
                Ok(Disposition::Ack)
            }
            TerminalUpdate::NotFound => {
                // Dropping would permanently strand the caller's poll.
                warn!(uid = %uid, "no request record visible yet, requeueing");
                Ok(Disposition::Requeue)
            }
        }
    }
}

/// Broker loop around [`CompletionHandler`].
pub struct CompletionRelay<S> {
    broker: Broker,
    handler: CompletionHandler<S>,
    cfg: BrokerConfig,
}

impl<S: RequestStore> CompletionRelay<S> {
    pub fn new(broker: Broker, handler: CompletionHandler<S>, cfg: BrokerConfig) -> Self {
        CompletionRelay {
            broker,
            handler,
            cfg,
        }
    }

    /// Consume until the broker connection is lost (fatal, like the
    /// ingress relay).
    pub async fn run(&self) -> Result<(), RelayError> {
        self.broker.declare(&self.cfg.completion_queue).await?;
        let mut consumer = self
            .broker
            .consume_exclusive(&self.cfg.completion_queue, "completion-relay")
            .await?;
        info!(queue = %self.cfg.completion_queue, "consuming completion notifications");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let correlation = delivery
                .properties
                .correlation_id()
                .as_ref()
                .map(|s| s.as_str().to_string());

            let disposition = match self
                .handler
                .handle(correlation.as_deref(), &delivery.data)
                .await
            {
                Ok(disposition) => disposition,
                Err(e) if e.is_permanent() => {
                    error!(
                        error = %e,
                        payload = %String::from_utf8_lossy(&delivery.data),
                        "unprocessable completion message"
                    );
                    Disposition::Ack
                }
                Err(e) => {
                    error!(error = %e, "completion handling failed, requeueing");
                    Disposition::Requeue
                }
            };

            match disposition {
                Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
                Disposition::Requeue => {
                    // Bounded delay so a not-yet-visible record does not
                    // spin the queue hot.
                    tokio::time::sleep(self.cfg.requeue_delay).await;
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..BasicNackOptions::default()
                        })
                        .await?;
                }
            }
        }

        Err(RelayError::ConsumerClosed {
            queue: self.cfg.completion_queue.clone(),
        })
    }
}
