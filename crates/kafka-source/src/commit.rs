use tracing::{debug, error, info, warn};

use crate::source::{CommitMode, RawRecord, ReadPosition, RecordSource};

/// Tracks the read position and commits it every `cadence` records,
/// whether or not those records matched.
///
/// Periodic commits are fire-and-forget and a failure is only logged: the
/// broker redelivers anything past the last successful commit. The final
/// commit at shutdown is synchronous.
pub struct CommitCoordinator {
    cadence: usize,
    since_last: usize,
    position: ReadPosition,
    async_commits: u64,
    failed_commits: u64,
}

impl CommitCoordinator {
    pub fn new(cadence: usize) -> Self {
        Self {
            cadence: cadence.max(1),
            since_last: 0,
            position: ReadPosition::new(),
            async_commits: 0,
            failed_commits: 0,
        }
    }

    /// Record one polled record. Returns true when a commit was issued.
    pub fn observe<S>(&mut self, source: &mut S, record: &RawRecord) -> bool
    where
        S: RecordSource + ?Sized,
    {
        self.position
            .advance(&record.topic, record.partition, record.offset);
        self.since_last += 1;

        if self.since_last < self.cadence {
            return false;
        }

        self.since_last = 0;
        self.async_commits += 1;
        match source.commit(&self.position, CommitMode::Async) {
            Ok(()) => debug!(
                "Async commit after {} records at offset {} [{}]",
                self.cadence, record.offset, record.partition
            ),
            Err(e) => {
                self.failed_commits += 1;
                warn!("Async commit failed, continuing: {e}");
            }
        }
        true
    }

    /// Synchronously commit the final position. Returns whether the broker
    /// accepted it; nothing is committed when no record was ever polled.
    pub fn finalize<S>(&mut self, source: &mut S) -> bool
    where
        S: RecordSource + ?Sized,
    {
        if self.position.is_empty() {
            debug!("No records polled, skipping final commit");
            return false;
        }

        match source.commit(&self.position, CommitMode::Sync) {
            Ok(()) => {
                info!("Committed final offsets {:?}", self.position.partitions());
                self.since_last = 0;
                true
            }
            Err(e) => {
                self.failed_commits += 1;
                error!("Final commit failed: {e}");
                false
            }
        }
    }

    pub fn position(&self) -> &ReadPosition {
        &self.position
    }

    /// Records observed since the last commit
    pub fn pending(&self) -> usize {
        self.since_last
    }

    pub fn async_commits(&self) -> u64 {
        self.async_commits
    }

    pub fn failed_commits(&self) -> u64 {
        self.failed_commits
    }
}
