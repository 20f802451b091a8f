//! Bounded-extraction Kafka consumer for `headline-extractor`.
//!
//! Attaches to one topic of morse-encoded headlines, keeps the records that
//! contain the target keyword, decodes them to plaintext and writes the first
//! N of them to an output file, committing offsets manually along the way.
//!
//! # Features
//!
//! - Manual offset management: async commits at a fixed cadence, one sync
//!   commit at shutdown
//! - Batched, append-only output with a forced flush on every exit path
//! - Cooperative cancellation between iterations
//! - Pluggable broker ([`RecordSource`]): rdkafka in production, an in-memory
//!   replay source for offline runs and tests

/// Offset bookkeeping and cadence-driven commits
pub mod commit;

/// rdkafka-backed record source
pub mod consumer;
pub mod error;

/// The consumer loop and its run context
pub mod extract;

/// File-backed / in-memory record source
pub mod replay;
pub mod sink;
pub mod source;

/// CLI configuration and the top-level entry point
pub mod sync;

pub use commit::CommitCoordinator;
pub use consumer::{ConsumerConfig, KafkaSource};
pub use error::{Error, Result};
pub use extract::{ExtractSettings, Extractor, RunOutcome, RunState, RunSummary};
pub use replay::{CommitEntry, CommitLog, ReplaySource};
pub use sink::OutputSink;
pub use source::{BrokerError, CommitMode, PartitionPosition, RawRecord, ReadPosition, RecordSource};
pub use sync::{run_extraction, Config, DecoderKind};
