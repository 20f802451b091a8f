use chrono::{DateTime, Utc};
use headline_extractor_morse::{LineDecoder, MatchFilter, TokenDecoder};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commit::CommitCoordinator;
use crate::error::{Error, Result};
use crate::sink::OutputSink;
use crate::source::{BrokerError, PartitionPosition, RawRecord, RecordSource};

/// Knobs of the consumer loop itself
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Stop once this many matching records were extracted
    pub max_extracted: u64,
    /// Upper bound for a single poll
    pub poll_timeout: Duration,
    /// Log polled/extracted counts every this many polled records
    pub progress_interval: u64,
    /// Stop at the first end-of-partition signal instead of waiting for more
    /// records. Meant for replays and single-partition topics.
    pub exit_on_eof: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            max_extracted: 1000,
            poll_timeout: Duration::from_secs(1),
            progress_interval: 1000,
            exit_on_eof: false,
        }
    }
}

/// Counters of one run. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// Records delivered by the broker
    pub polled: u64,
    /// Matching records decoded and handed to the sink
    pub extracted: u64,
    /// Matching records dropped because they failed to decode
    pub skipped: u64,
    cap: u64,
}

impl RunState {
    pub fn new(cap: u64) -> Self {
        Self {
            cap,
            ..Default::default()
        }
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    pub fn cap_reached(&self) -> bool {
        self.extracted >= self.cap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The extraction cap was reached
    Completed,
    /// Cancelled from outside
    Interrupted,
    /// The broker ran out of records (only with `exit_on_eof`)
    EndOfInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub polled: u64,
    pub extracted: u64,
    pub skipped: u64,
    pub lines_written: u64,
    pub flushes: u64,
    pub async_commits: u64,
    pub final_commit: bool,
    pub positions: Vec<PartitionPosition>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Run context of the consumer loop.
///
/// Owns the broker connection and the output file for the whole run:
/// acquired when the extractor is built, released by [`Extractor::run`] on
/// every exit path.
pub struct Extractor<S, D> {
    source: S,
    decoder: LineDecoder<D>,
    filter: MatchFilter,
    sink: OutputSink,
    commits: CommitCoordinator,
    state: RunState,
    settings: ExtractSettings,
}

impl<S, D> Extractor<S, D>
where
    S: RecordSource,
    D: TokenDecoder,
{
    pub fn new(
        source: S,
        decoder: LineDecoder<D>,
        filter: MatchFilter,
        sink: OutputSink,
        commits: CommitCoordinator,
        settings: ExtractSettings,
    ) -> Self {
        Self {
            source,
            decoder,
            filter,
            sink,
            commits,
            state: RunState::new(settings.max_extracted),
            settings,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Consume until the cap is reached, `shutdown` is cancelled or a fatal
    /// error occurs, then flush the output, commit the final position and
    /// close the source.
    ///
    /// A fatal error is returned after that cleanup was attempted.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<RunSummary> {
        let started_at = Utc::now();
        info!(
            "Extracting up to {} records matching {}",
            self.state.cap(),
            self.filter.marker()
        );

        let result = self.consume(&shutdown).await;
        let output_failed = matches!(result, Err(Error::Output { .. }));
        let cleanup = self.shutdown(output_failed).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(cleanup_err) = cleanup {
                    error!("Shutdown after failure did not complete: {cleanup_err}");
                }
                return Err(e);
            }
        };
        let final_commit = cleanup?;

        let summary = RunSummary {
            outcome,
            polled: self.state.polled,
            extracted: self.state.extracted,
            skipped: self.state.skipped,
            lines_written: self.sink.lines_written(),
            flushes: self.sink.flushes(),
            async_commits: self.commits.async_commits(),
            final_commit,
            positions: self.commits.position().partitions(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Run finished ({:?}): extracted {} of {} polled records, {} skipped",
            summary.outcome, summary.extracted, summary.polled, summary.skipped
        );
        Ok(summary)
    }

    async fn consume(&mut self, shutdown: &CancellationToken) -> Result<RunOutcome> {
        loop {
            if self.state.cap_reached() {
                info!("Extracted {} records, stopping", self.state.extracted);
                return Ok(RunOutcome::Completed);
            }
            if shutdown.is_cancelled() {
                info!("Interrupted after {} polled records", self.state.polled);
                return Ok(RunOutcome::Interrupted);
            }

            // Only the poll may be abandoned on interrupt; it has no side effects.
            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => continue,
                polled = self.source.poll(self.settings.poll_timeout) => polled,
            };

            match polled {
                Ok(None) => continue,
                Ok(Some(record)) => self.process(record).await?,
                Err(eof @ BrokerError::PartitionEof { .. }) => {
                    info!("{eof}");
                    if self.settings.exit_on_eof {
                        return Ok(RunOutcome::EndOfInput);
                    }
                }
                Err(BrokerError::Fatal(reason)) => return Err(Error::Poll(reason)),
            }
        }
    }

    /// One delivered record: filter, maybe decode and buffer, then commit
    /// bookkeeping. A failed write leaves the record uncommitted.
    async fn process(&mut self, record: RawRecord) -> Result<()> {
        if self.state.polled == 0 {
            info!(
                "First record at offset {} [{}]",
                record.offset, record.partition
            );
        }
        self.state.polled += 1;

        if !self.state.cap_reached() {
            self.extract(&record).await?;
        }

        self.commits.observe(&mut self.source, &record);

        if self.state.polled % self.settings.progress_interval.max(1) == 0 {
            info!(
                "Progress: {} extracted from {} polled records (offset {} [{}])",
                self.state.extracted, self.state.polled, record.offset, record.partition
            );
        }

        Ok(())
    }

    async fn extract(&mut self, record: &RawRecord) -> Result<()> {
        let payload = match record.payload_str() {
            Ok(payload) => payload,
            Err(e) => {
                debug!(
                    "Ignoring record at offset {} [{}]: {e}",
                    record.offset, record.partition
                );
                return Ok(());
            }
        };

        if !self.filter.matches(payload) {
            return Ok(());
        }

        let line = match self.decoder.decode(payload).await {
            Ok(line) => line.to_lowercase(),
            Err(e) => {
                self.state.skipped += 1;
                warn!(
                    "Skipping matching record at offset {} [{}]: {e}",
                    record.offset, record.partition
                );
                return Ok(());
            }
        };

        debug!("Extracted offset {}: {line}", record.offset);
        self.state.extracted += 1;
        if self.sink.append(line)? {
            info!(
                "Batch written: {} extracted from {} polled records (offset {} [{}])",
                self.state.extracted, self.state.polled, record.offset, record.partition
            );
        }
        Ok(())
    }

    /// Flush, commit the final position and close. The final commit only
    /// happens when every extracted line reached the output file.
    async fn shutdown(&mut self, output_failed: bool) -> Result<bool> {
        info!("Flushing output and committing final offsets");
        let flushed = self.sink.flush();
        let committed = if output_failed || flushed.is_err() {
            warn!(
                "Output not fully written, skipping final commit ({} lines buffered)",
                self.sink.buffered()
            );
            false
        } else {
            self.commits.finalize(&mut self.source)
        };
        let closed = self.source.close().await;

        flushed?;
        closed?;
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplaySource;
    use crate::source::CommitMode;
    use headline_extractor_morse::{encode_line, LocalDecoder};
    use tempfile::TempDir;

    fn settings(max_extracted: u64) -> ExtractSettings {
        ExtractSettings {
            max_extracted,
            poll_timeout: Duration::from_millis(10),
            progress_interval: 1000,
            exit_on_eof: true,
        }
    }

    fn extractor(
        source: ReplaySource,
        dir: &TempDir,
        batch_size: usize,
        cadence: usize,
        max_extracted: u64,
    ) -> Extractor<ReplaySource, LocalDecoder> {
        Extractor::new(
            source,
            LineDecoder::new(LocalDecoder),
            MatchFilter::for_keyword("australia").unwrap(),
            OutputSink::create(dir.path().join("out.txt"), batch_size).unwrap(),
            CommitCoordinator::new(cadence),
            settings(max_extracted),
        )
    }

    fn encoded(text: &str) -> String {
        encode_line(text).unwrap()
    }

    #[test]
    fn test_run_state_cap() {
        let mut state = RunState::new(2);
        assert!(!state.cap_reached());
        state.extracted = 2;
        assert!(state.cap_reached());
    }

    #[tokio::test]
    async fn test_only_matching_records_are_extracted() {
        let dir = TempDir::new().unwrap();
        let source = ReplaySource::from_payloads(
            "headlines",
            [
                encoded("Australia wins"),
                encoded("australian open"),
                encoded("nothing here"),
                encoded("floods in Australia"),
            ],
        );

        let summary = extractor(source, &dir, 10, 100, 10)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::EndOfInput);
        assert_eq!(summary.polled, 4);
        assert_eq!(summary.extracted, 2);
        let output = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(output, "australia wins\nfloods in australia\n");
    }

    #[tokio::test]
    async fn test_undecodable_match_is_skipped() {
        let dir = TempDir::new().unwrap();
        let broken = format!("{}/........", encoded("australia"));
        let source = ReplaySource::from_payloads(
            "headlines",
            [broken, encoded("australia day")],
        );
        let log = source.commit_log();

        let summary = extractor(source, &dir, 10, 1, 10)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.polled, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.extracted, 1);
        // The skipped record still went through the commit step.
        assert_eq!(log.count(CommitMode::Async), 2);
        let output = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(output, "australia day\n");
    }

    #[tokio::test]
    async fn test_invalid_payloads_do_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let mut source = ReplaySource::new("headlines");
        source.push(vec![0xff, 0xfe, 0xfd]);
        source.push(encoded("australia"));

        let summary = extractor(source, &dir, 10, 100, 10)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.polled, 2);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_failed_final_flush_skips_final_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let source = ReplaySource::from_payloads(
            "headlines",
            (0..5).map(|i| encoded(&format!("australia {i}"))),
        );
        let log = source.commit_log();
        let sink = OutputSink::create(&path, 100).unwrap();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let extractor = Extractor::new(
            source,
            LineDecoder::new(LocalDecoder),
            MatchFilter::for_keyword("australia").unwrap(),
            sink,
            CommitCoordinator::new(100),
            settings(5),
        );
        let err = extractor.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, Error::Output { .. }));
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let source = ReplaySource::from_payloads("headlines", [encoded("australia")]);
        let log = source.commit_log();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let summary = extractor(source, &dir, 10, 100, 10)
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Interrupted);
        assert_eq!(summary.polled, 0);
        assert!(!summary.final_commit);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_aborts_idle_poll() {
        let dir = TempDir::new().unwrap();
        let source = ReplaySource::from_payloads("headlines", [encoded("australia")]);
        let mut settings = settings(10);
        settings.exit_on_eof = false;
        settings.poll_timeout = Duration::from_secs(3600);
        let extractor = Extractor::new(
            source,
            LineDecoder::new(LocalDecoder),
            MatchFilter::for_keyword("australia").unwrap(),
            OutputSink::create(dir.path().join("out.txt"), 10).unwrap(),
            CommitCoordinator::new(100),
            settings,
        );

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let summary = tokio::time::timeout(Duration::from_secs(10), extractor.run(shutdown))
            .await
            .expect("run should stop on interrupt")
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Interrupted);
        assert_eq!(summary.extracted, 1);
        assert!(summary.final_commit);
        let output = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(output, "australia\n");
    }
}
