//! Thin wrapper over the AMQP channel used by both relay halves.

use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::info;

use protocol::BrokerConfig;

use crate::error::RelayError;

/// One connection + channel, configured for relay use: prefetch 1 and
/// publisher confirms enabled.
pub struct Broker {
    // Kept alive for the lifetime of the channel.
    _connection: Connection,
    channel: Channel,
}

impl Broker {
    /// Connect to the broker named in the configuration.
    pub async fn connect(cfg: &BrokerConfig) -> Result<Self, RelayError> {
        let connection = Connection::connect(&cfg.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        info!("connected to broker");
        Ok(Broker {
            _connection: connection,
            channel,
        })
    }

    /// Declare a queue so consuming/publishing cannot race its creation.
    pub async fn declare(&self, queue: &str) -> Result<(), RelayError> {
        self.channel
            .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
            .await?;
        Ok(())
    }

    /// Publish `payload` to `queue` with the request id as correlation id,
    /// waiting for the broker's publisher confirm.
    pub async fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        correlation_id: &str,
    ) -> Result<(), RelayError> {
        let properties =
            BasicProperties::default().with_correlation_id(ShortString::from(correlation_id.to_string()));
        let confirmation = self
            .channel
            .basic_publish("", queue, BasicPublishOptions::default(), payload, properties)
            .await?
            .await?;
        match confirmation {
            Confirmation::Nack(_) => Err(RelayError::PublishRejected {
                queue: queue.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Start an exclusive consumer on `queue`.
    ///
    /// Exclusivity is the named lease that enforces "one active consumer
    /// per queue role": a second relay instance fails to consume instead of
    /// splitting deliveries round-robin.
    pub async fn consume_exclusive(&self, queue: &str, tag: &str) -> Result<Consumer, RelayError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                tag,
                BasicConsumeOptions {
                    exclusive: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }
}
