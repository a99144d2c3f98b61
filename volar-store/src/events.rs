use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};
use volar_core::{Notifier, NotifyError};
use volar_shared::models::events::NotificationEnvelope;

/// Publishes notification envelopes to Kafka; a mailer service consumes them
#[derive(Clone)]
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn send(&self, template: &str, recipient: &str, payload: Value) -> Result<(), NotifyError> {
        let envelope = NotificationEnvelope {
            template: template.to_string(),
            recipient: recipient.to_string(),
            payload,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let body = serde_json::to_string(&envelope).map_err(|e| NotifyError::Payload(e.to_string()))?;

        let record = FutureRecord::to(&self.topic).key(recipient).payload(&body);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent {} notification to {}: partition {} offset {}",
                    template, self.topic, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send {} notification to {}: {}", template, self.topic, e);
                Err(NotifyError::Transport(e.to_string()))
            }
        }
    }
}
