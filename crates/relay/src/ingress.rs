//! Ingress relay: inbound submissions -> rendering work queue.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use tracing::{error, info};

use protocol::{peek_uid, BrokerConfig};

use crate::broker::Broker;
use crate::error::RelayError;

/// Publishing half of the broker, as the ingress relay sees it.
#[async_trait]
pub trait WorkPublisher: Send + Sync {
    /// Publish `payload` to `queue` under publisher confirms, carrying the
    /// request id as correlation id. Returns only once the broker has
    /// confirmed the publish.
    async fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        correlation_id: &str,
    ) -> Result<(), RelayError>;
}

#[async_trait]
impl WorkPublisher for Broker {
    async fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        correlation_id: &str,
    ) -> Result<(), RelayError> {
        Broker::publish(self, queue, payload, correlation_id).await
    }
}

#[async_trait]
impl<'a, P: WorkPublisher> WorkPublisher for &'a P {
    async fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        correlation_id: &str,
    ) -> Result<(), RelayError> {
        (**self).publish(queue, payload, correlation_id).await
    }
}

/// Pure per-message logic of the ingress relay, separated from the broker
/// loop so it can be exercised directly.
pub struct IngressHandler<P> {
    publisher: P,
    work_queue: String,
}

impl<P: WorkPublisher> IngressHandler<P> {
    pub fn new(publisher: P, work_queue: impl Into<String>) -> Self {
        IngressHandler {
            publisher,
            work_queue: work_queue.into(),
        }
    }

    /// Forward one submission to the work queue byte-for-byte.
    ///
    /// Returns the uid only after the outbound publish is confirmed, so the
    /// caller acks the inbound delivery strictly after the hand-off is
    /// durable. The only permanent fault is an unparsable payload; publish
    /// faults are worth redelivering.
    pub async fn handle(&self, payload: &[u8]) -> Result<String, RelayError> {
        let uid = peek_uid(payload)?;
        self.publisher
            .publish(&self.work_queue, payload, &uid)
            .await?;
        Ok(uid)
    }
}

/// Broker loop around [`IngressHandler`].
///
/// At-least-once hand-off: duplicates downstream are acceptable, loss is
/// not. This component holds no durable state of its own.
pub struct IngressRelay {
    broker: Broker,
    cfg: BrokerConfig,
}

impl IngressRelay {
    pub fn new(broker: Broker, cfg: BrokerConfig) -> Self {
        IngressRelay { broker, cfg }
    }

    /// Consume until the broker connection is lost.
    ///
    /// Returns `Err` when the consumer stream ends or errors, so the
    /// process exits and a supervisor restarts it; the broker redelivers
    /// anything unacknowledged.
    pub async fn run(&self) -> Result<(), RelayError> {
        self.broker.declare(&self.cfg.inbound_queue).await?;
        self.broker.declare(&self.cfg.work_queue).await?;
        let handler = IngressHandler::new(&self.broker, self.cfg.work_queue.clone());
        let mut consumer = self
            .broker
            .consume_exclusive(&self.cfg.inbound_queue, "ingress-relay")
            .await?;
        info!(queue = %self.cfg.inbound_queue, "consuming submissions");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            match handler.handle(&delivery.data).await {
                Ok(uid) => {
                    info!(uid = %uid, queue = %self.cfg.work_queue, "forwarded submission");
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(e) if e.is_permanent() => {
                    // Redelivery cannot repair a parse failure; log the
                    // payload and move on rather than poison the queue.
                    error!(
                        error = %e,
                        payload = %String::from_utf8_lossy(&delivery.data),
                        "unparsable submission message"
                    );
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(e) => {
                    error!(error = %e, "publish failed, requeueing submission");
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
            queue: self.cfg.inbound_queue.clone(),
        })
    }
}
