use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message as RdkafkaMessage;
use rdkafka::{Offset, TopicPartitionList};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::source::{BrokerError, CommitMode, RawRecord, ReadPosition, RecordSource};

/// Configuration for the Kafka consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic to consume from
    pub topic: String,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// "earliest" makes a fresh consumer group start from the beginning of
    /// the topic, which is what a bounded extraction of the first N matches
    /// needs.
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
    /// Minimum bytes the broker accumulates before answering a fetch
    ///
    /// Large values favour throughput over latency.
    pub fetch_min_bytes: String,
    /// Report end-of-partition as an event instead of staying silent
    pub enable_partition_eof: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "morse-code-local-0".to_string(),
            topic: "".to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: "6000".to_string(),
            fetch_min_bytes: "100000".to_string(),
            enable_partition_eof: true,
        }
    }
}

/// Kafka consumer with manual offset management.
///
/// Auto commit is always disabled: offsets only move when the commit
/// coordinator says so.
pub struct KafkaSource {
    consumer: RdkafkaStreamConsumer,
    topic: String,
    delivered: HashMap<i32, i64>,
}

impl KafkaSource {
    /// Create the consumer and subscribe to the configured topic
    pub fn connect(config: &ConsumerConfig) -> Result<Self> {
        if config.topic.is_empty() {
            return Err(Error::InvalidConfig("topic must not be empty".to_string()));
        }

        let consumer: RdkafkaStreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", &config.session_timeout_ms)
            .set("fetch.min.bytes", &config.fetch_min_bytes)
            .set(
                "enable.partition.eof",
                config.enable_partition_eof.to_string(),
            )
            .create()
            .map_err(|e| Error::Connect(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| Error::Connect(format!("Failed to subscribe to topic: {e}")))?;

        info!(
            "Subscribed to topic {} as group {} on {}",
            config.topic, config.group_id, config.brokers
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            delivered: HashMap::new(),
        })
    }
}

/// Build the commit list for a read position. Kafka expects the offset of
/// the next record to read, hence `offset + 1`.
pub fn commit_list(position: &ReadPosition) -> Result<TopicPartitionList> {
    let mut tpl = TopicPartitionList::new();
    for p in position.partitions() {
        tpl.add_partition_offset(&p.topic, p.partition, Offset::Offset(p.offset + 1))
            .map_err(|e| Error::Commit(format!("Failed to add partition offset: {e}")))?;
    }
    Ok(tpl)
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<RawRecord>, BrokerError> {
        let received = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => return Ok(None),
            Ok(received) => received,
        };

        match received {
            Ok(msg) => {
                let record = RawRecord {
                    topic: msg.topic().to_string(),
                    partition: msg.partition(),
                    offset: msg.offset(),
                    payload: msg.payload().map(|p| p.to_vec()),
                };
                self.delivered.insert(record.partition, record.offset);
                Ok(Some(record))
            }
            Err(KafkaError::PartitionEOF(partition)) => Err(BrokerError::PartitionEof {
                topic: self.topic.clone(),
                partition,
                offset: self
                    .delivered
                    .get(&partition)
                    .map_or(0, |offset| offset + 1),
            }),
            Err(e) => Err(BrokerError::Fatal(format!("Error receiving message: {e}"))),
        }
    }

    fn commit(&mut self, position: &ReadPosition, mode: CommitMode) -> Result<()> {
        let tpl = commit_list(position)?;
        self.consumer
            .commit(&tpl, mode.into())
            .map_err(|e| Error::Commit(format!("Failed to commit offsets: {e}")))?;
        debug!("Committed {:?} offsets {:?}", mode, position.partitions());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.consumer.unsubscribe();
        info!("Left consumer group for topic {}", self.topic);
        Ok(())
    }
}
