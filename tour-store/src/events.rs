use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tour_core::NotificationSink;
use tour_shared::models::events::Notification;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Hands notifications to the mail/push services through Kafka, keyed by subscription.
pub struct KafkaNotificationSink {
    producer: EventProducer,
}

impl KafkaNotificationSink {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl NotificationSink for KafkaNotificationSink {
    async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(notification)?;
        self.producer
            .publish(
                notification.kind.topic(),
                &notification.subscription_id.to_string(),
                &payload,
            )
            .await?;
        Ok(())
    }
}
