//! Kafka producer library for testing headline-extractor
//!
//! Publishes plaintext headlines to a topic in the same morse payload format
//! the extractor consumes: letters separated by a space, words by `/`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use headline_extractor_kafka_producer::HeadlineProducer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let producer = HeadlineProducer::new("localhost:9092").await?;
//!     producer.create_topic_if_not_exists("headlines", 1).await?;
//!     producer
//!         .publish_headline("headlines", "australia wins the ashes")
//!         .await?;
//!     Ok(())
//! }
//! ```

use anyhow::{bail, Context, Result};
use headline_extractor_morse::encode_line;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;

// Test data helpers module
pub mod testdata;

pub use testdata::{publish_test_headlines, test_headlines, TestHeadline};

/// Publishes encoded headlines to a test topic.
///
/// Holds one producer and one admin client against the same bootstrap list.
pub struct HeadlineProducer {
    producer: FutureProducer,
    admin: AdminClient<DefaultClientContext>,
}

fn client_config(broker: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", broker);
    config
}

impl HeadlineProducer {
    pub async fn new(broker: &str) -> Result<Self> {
        let producer: FutureProducer = client_config(broker)
            .set("message.timeout.ms", "5000")
            .create()
            .with_context(|| format!("Cannot create headline producer for {broker}"))?;
        let admin: AdminClient<DefaultClientContext> = client_config(broker)
            .create()
            .with_context(|| format!("Cannot create admin client for {broker}"))?;

        Ok(Self { producer, admin })
    }

    /// Create `topic` with `partitions` partitions. An existing topic is
    /// left as it is.
    pub async fn create_topic_if_not_exists(&self, topic: &str, partitions: i32) -> Result<()> {
        let request = NewTopic::new(topic, partitions, TopicReplication::Fixed(1));
        let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(5)));

        let outcomes = self
            .admin
            .create_topics([&request], &options)
            .await
            .with_context(|| format!("Topic creation request for {topic} failed"))?;

        for outcome in outcomes {
            match outcome {
                Ok(name) => tracing::info!("Created topic {name} ({partitions} partitions)"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!("Topic {name} already exists")
                }
                Err((name, code)) => bail!("Cannot create topic {name}: {code}"),
            }
        }

        Ok(())
    }

    /// Encode a plaintext headline and publish it
    pub async fn publish_headline(&self, topic: &str, headline: &str) -> Result<()> {
        let payload = encode_line(headline)
            .with_context(|| format!("Cannot encode headline {headline:?}"))?;
        self.publish_payload(topic, &payload).await
    }

    /// Publish an already encoded payload as-is
    pub async fn publish_payload(&self, topic: &str, payload: &str) -> Result<()> {
        let record: FutureRecord<'_, (), str> = FutureRecord::to(topic).payload(payload);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| err)
            .context("Failed to send headline to Kafka")?;

        tracing::debug!("Published headline payload: {payload}");
        Ok(())
    }

    /// Publish headlines in order. Returns the number published.
    pub async fn publish_headlines<I, S>(&self, topic: &str, headlines: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for headline in headlines {
            self.publish_headline(topic, headline.as_ref()).await?;
            count += 1;
        }
        Ok(count)
    }
}
