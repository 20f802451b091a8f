use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::source::{
    BrokerError, CommitMode, PartitionPosition, RawRecord, ReadPosition, RecordSource,
};

/// One commit issued against a [`ReplaySource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub mode: CommitMode,
    pub offsets: Vec<PartitionPosition>,
}

/// Shared record of commits, readable after the source was moved into a run.
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    entries: Arc<Mutex<Vec<CommitEntry>>>,
}

impl CommitLog {
    fn push(&self, entry: CommitEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<CommitEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, mode: CommitMode) -> usize {
        self.entries().iter().filter(|e| e.mode == mode).count()
    }

    pub fn last(&self) -> Option<CommitEntry> {
        self.entries().last().cloned()
    }
}

/// Replays a fixed sequence of payloads as a single-partition topic.
///
/// Offsets start at 0. Once the records run out the source reports
/// end-of-partition once, then behaves like an idle broker (every poll waits
/// out its timeout). Commits are recorded in a [`CommitLog`].
pub struct ReplaySource {
    topic: String,
    pending: VecDeque<RawRecord>,
    next_offset: i64,
    eof_reported: bool,
    commits: CommitLog,
    closed: bool,
}

impl ReplaySource {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            pending: VecDeque::new(),
            next_offset: 0,
            eof_reported: false,
            commits: CommitLog::default(),
            closed: false,
        }
    }

    pub fn from_payloads<I, P>(topic: impl Into<String>, payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let mut source = Self::new(topic);
        for payload in payloads {
            source.push(payload);
        }
        source
    }

    /// Load one payload per non-empty line of a text file
    pub async fn from_file(path: impl AsRef<Path>, topic: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Replay {
                path: path.to_path_buf(),
                source,
            })?;

        let source = Self::from_payloads(
            topic,
            contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_owned),
        );
        info!(
            "Loaded {} records for replay from {}",
            source.remaining(),
            path.display()
        );
        Ok(source)
    }

    pub fn push(&mut self, payload: impl Into<Vec<u8>>) {
        self.pending.push_back(RawRecord {
            topic: self.topic.clone(),
            partition: 0,
            offset: self.next_offset,
            payload: Some(payload.into()),
        });
        self.next_offset += 1;
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn commit_log(&self) -> CommitLog {
        self.commits.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl RecordSource for ReplaySource {
    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<RawRecord>, BrokerError> {
        if self.closed {
            return Err(BrokerError::Fatal("replay source is closed".to_string()));
        }
        if let Some(record) = self.pending.pop_front() {
            return Ok(Some(record));
        }
        if !self.eof_reported {
            self.eof_reported = true;
            return Err(BrokerError::PartitionEof {
                topic: self.topic.clone(),
                partition: 0,
                offset: self.next_offset,
            });
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    fn commit(&mut self, position: &ReadPosition, mode: CommitMode) -> Result<()> {
        if self.closed {
            return Err(Error::Commit("replay source is closed".to_string()));
        }
        debug!("Replay commit {:?} {:?}", mode, position.partitions());
        self.commits.push(CommitEntry {
            mode,
            offsets: position.partitions(),
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_replays_in_order_then_reports_eof() {
        let mut source = ReplaySource::from_payloads("headlines", ["-", "--"]);

        let first = source.poll(TIMEOUT).await.unwrap().unwrap();
        let second = source.poll(TIMEOUT).await.unwrap().unwrap();
        assert_eq!((first.offset, first.payload.as_deref()), (0, Some(&b"-"[..])));
        assert_eq!((second.offset, second.payload.as_deref()), (1, Some(&b"--"[..])));

        assert_eq!(
            source.poll(TIMEOUT).await,
            Err(BrokerError::PartitionEof {
                topic: "headlines".to_string(),
                partition: 0,
                offset: 2,
            })
        );
        assert_eq!(source.poll(TIMEOUT).await, Ok(None));
    }

    #[tokio::test]
    async fn test_commit_log_is_shared() {
        let mut source = ReplaySource::new("headlines");
        let log = source.commit_log();

        let mut position = ReadPosition::new();
        position.advance("headlines", 0, 5);
        source.commit(&position, CommitMode::Async).unwrap();
        source.commit(&position, CommitMode::Sync).unwrap();

        assert_eq!(log.count(CommitMode::Async), 1);
        assert_eq!(log.count(CommitMode::Sync), 1);
        assert_eq!(log.last().unwrap().offsets[0].offset, 5);
    }

    #[tokio::test]
    async fn test_closed_source_refuses_work() {
        let mut source = ReplaySource::from_payloads("headlines", ["-"]);
        source.close().await.unwrap();
        assert!(source.is_closed());
        assert!(matches!(
            source.poll(TIMEOUT).await,
            Err(BrokerError::Fatal(_))
        ));
        assert!(source.commit(&ReadPosition::new(), CommitMode::Sync).is_err());
    }

    #[tokio::test]
    async fn test_from_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlines.txt");
        std::fs::write(&path, "... --- ...\n\n-- --- .-. ... .\n").unwrap();

        let source = ReplaySource::from_file(&path, "headlines").await.unwrap();
        assert_eq!(source.remaining(), 2);
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let result = ReplaySource::from_file("/nonexistent/headlines.txt", "headlines").await;
        assert!(matches!(result, Err(Error::Replay { .. })));
    }
}
