//! Broker abstraction used by the consumer loop.

use async_trait::async_trait;
use headline_extractor_morse::DecodeError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;

/// One record as delivered by the broker. Read-only for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

impl RawRecord {
    pub fn payload_str(&self) -> std::result::Result<&str, DecodeError> {
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| DecodeError::Malformed("record has no payload".to_string()))?;
        Ok(std::str::from_utf8(payload)?)
    }
}

/// Errors reported by [`RecordSource::poll`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The consumer caught up with the partition. Not a failure.
    #[error("{topic} [{partition}] reached end at offset {offset}")]
    PartitionEof {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("{0}")]
    Fatal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Fire-and-forget
    Async,
    /// Blocks until the broker acknowledged the offsets
    Sync,
}

impl From<CommitMode> for rdkafka::consumer::CommitMode {
    fn from(mode: CommitMode) -> Self {
        match mode {
            CommitMode::Async => rdkafka::consumer::CommitMode::Async,
            CommitMode::Sync => rdkafka::consumer::CommitMode::Sync,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPosition {
    pub topic: String,
    pub partition: i32,
    /// Offset of the last polled record
    pub offset: i64,
}

/// Offset of the most recently polled record, per topic partition.
///
/// Never moves backwards: a stale offset for a partition is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPosition {
    offsets: BTreeMap<(String, i32), i64>,
}

impl ReadPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, topic: &str, partition: i32, offset: i64) {
        self.offsets
            .entry((topic.to_string(), partition))
            .and_modify(|current| *current = (*current).max(offset))
            .or_insert(offset);
    }

    pub fn offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.offsets.get(&(topic.to_string(), partition)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn partitions(&self) -> Vec<PartitionPosition> {
        self.offsets
            .iter()
            .map(|((topic, partition), offset)| PartitionPosition {
                topic: topic.clone(),
                partition: *partition,
                offset: *offset,
            })
            .collect()
    }
}

/// A broker connection owned by the consumer loop for the whole run.
#[async_trait]
pub trait RecordSource: Send {
    /// Wait at most `timeout` for the next record. `Ok(None)` on timeout.
    async fn poll(&mut self, timeout: Duration)
        -> std::result::Result<Option<RawRecord>, BrokerError>;

    /// Commit `position` (the next record to read is `offset + 1`).
    fn commit(&mut self, position: &ReadPosition, mode: CommitMode) -> Result<()>;

    /// Leave the group and release the connection.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<RawRecord>, BrokerError> {
        (**self).poll(timeout).await
    }

    fn commit(&mut self, position: &ReadPosition, mode: CommitMode) -> Result<()> {
        (**self).commit(position, mode)
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
