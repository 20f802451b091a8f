//! Bounded extraction of morse-encoded headlines from Kafka.
//!
//! Builds the broker source, the decoder client and the output sink from the
//! CLI configuration and drives one [`Extractor`] run.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use headline_extractor_morse::{
    CachedDecoder, HttpDecoder, LineDecoder, LocalDecoder, MatchFilter, RetryPolicy, TokenDecoder,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commit::CommitCoordinator;
use crate::consumer::{ConsumerConfig, KafkaSource};
use crate::error::Error;
use crate::extract::{ExtractSettings, Extractor, RunSummary};
use crate::replay::ReplaySource;
use crate::sink::OutputSink;
use crate::source::RecordSource;

/// Which decoder client resolves morse tokens
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DecoderKind {
    /// Built-in encoding table
    #[value(name = "local")]
    Local,
    /// Remote translate service, one request per token
    #[value(name = "http")]
    Http,
}

/// Configuration for a headline extraction run.
#[derive(Debug, Clone, Parser)]
pub struct Config {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[clap(long, value_delimiter = ',', default_value = "localhost:9092", env = "HEADLINES_BROKERS")]
    pub brokers: Vec<String>,
    /// Consumer group ID
    #[clap(long, default_value = "morse-code-local-0", env = "HEADLINES_GROUP_ID")]
    pub group_id: String,
    /// Topic to consume from
    #[clap(long, default_value = "au.com.eliiza.newsheadlines.txt", env = "HEADLINES_TOPIC")]
    pub topic: String,
    /// Keyword to extract; matched as whole word(s) on the encoded payload
    #[clap(long, default_value = "australia", env = "HEADLINES_KEYWORD")]
    pub keyword: String,
    /// Output file, recreated at the start of every run
    #[clap(long, default_value = "newsheadlines_first_1000.txt", env = "HEADLINES_OUTPUT_PATH")]
    pub output_path: PathBuf,
    /// Stop after extracting this many matching records
    #[clap(long, default_value_t = 1000)]
    pub max_extracted: u64,
    /// Number of decoded lines buffered before they are appended to the output file
    #[clap(long, default_value_t = 100)]
    pub flush_batch_size: usize,
    /// Issue an async offset commit every this many polled records
    #[clap(long, default_value_t = 100)]
    pub commit_every: usize,
    /// Maximum time a single poll waits for a record, in milliseconds
    #[clap(long, default_value_t = 1000)]
    pub poll_timeout_ms: u64,
    /// Session timeout in milliseconds
    #[clap(long, default_value = "6000")]
    pub session_timeout_ms: String,
    /// Minimum fetch size in bytes (throughput over latency)
    #[clap(long, default_value = "100000")]
    pub fetch_min_bytes: String,
    /// Offset reset policy when the group has no committed offsets
    #[clap(long, default_value = "earliest")]
    pub auto_offset_reset: String,
    /// Decoder client used for matching records
    #[clap(long, value_enum, default_value_t = DecoderKind::Local)]
    pub decoder: DecoderKind,
    /// Base URL of the translate service (used with --decoder http)
    #[clap(
        long,
        default_value = "http://localhost:8083/kafka-coding-challenge/translate",
        env = "HEADLINES_DECODER_URL"
    )]
    pub decoder_url: String,
    /// Retries per token after a failed service call
    #[clap(long, default_value_t = 3)]
    pub decoder_retries: u32,
    /// Initial retry backoff in milliseconds (doubles per attempt)
    #[clap(long, default_value_t = 200)]
    pub decoder_backoff_ms: u64,
    /// Per-request timeout of the translate service in milliseconds
    #[clap(long, default_value_t = 5000)]
    pub decoder_timeout_ms: u64,
    /// Memoize decoded tokens (the encoding is context-free)
    #[clap(long)]
    pub decoder_cache: bool,
    /// Log progress every this many polled records
    #[clap(long, default_value_t = 1000)]
    pub progress_interval: u64,
    /// Stop at the first end-of-partition signal
    #[clap(long)]
    pub exit_on_eof: bool,
    /// Read payloads from this file (one per line) instead of Kafka
    #[clap(long, value_name = "PATH")]
    pub replay_file: Option<PathBuf>,
    /// Write the run summary as JSON to this file
    #[clap(long, value_name = "PATH")]
    pub emit_summary: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> std::result::Result<(), Error> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.max_extracted == 0 {
            return invalid("--max-extracted must be at least 1");
        }
        if self.flush_batch_size == 0 {
            return invalid("--flush-batch-size must be at least 1");
        }
        if self.commit_every == 0 {
            return invalid("--commit-every must be at least 1");
        }
        if self.poll_timeout_ms == 0 {
            return invalid("--poll-timeout-ms must be at least 1");
        }
        if self.topic.is_empty() {
            return invalid("--topic must not be empty");
        }
        if self.replay_file.is_none() && self.brokers.iter().all(|b| b.trim().is_empty()) {
            return invalid("at least one broker is required");
        }
        Ok(())
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            brokers: self.brokers.join(","),
            group_id: self.group_id.clone(),
            topic: self.topic.clone(),
            auto_offset_reset: self.auto_offset_reset.clone(),
            session_timeout_ms: self.session_timeout_ms.clone(),
            fetch_min_bytes: self.fetch_min_bytes.clone(),
            ..Default::default()
        }
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            max_extracted: self.max_extracted,
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            progress_interval: self.progress_interval,
            exit_on_eof: self.exit_on_eof,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.decoder_retries,
            Duration::from_millis(self.decoder_backoff_ms),
        )
    }
}

/// Build the decoder client selected by the configuration
pub fn build_decoder(config: &Config) -> Result<Box<dyn TokenDecoder>> {
    let decoder: Box<dyn TokenDecoder> = match config.decoder {
        DecoderKind::Local => Box::new(LocalDecoder),
        DecoderKind::Http => {
            info!("Decoding tokens via {}", config.decoder_url);
            Box::new(HttpDecoder::new(
                config.decoder_url.clone(),
                Duration::from_millis(config.decoder_timeout_ms),
                config.retry_policy(),
            )?)
        }
    };

    if config.decoder_cache {
        return Ok(Box::new(CachedDecoder::new(decoder)));
    }
    Ok(decoder)
}

/// Run one extraction.
///
/// Returns when the cap is reached, `shutdown` is cancelled, or (with
/// `exit_on_eof`) the topic is exhausted. The output is flushed and the final
/// offsets committed in all of these cases.
pub async fn run_extraction(config: Config, shutdown: CancellationToken) -> Result<RunSummary> {
    config.validate()?;

    let filter = MatchFilter::for_keyword(&config.keyword)
        .with_context(|| format!("Cannot build a marker for keyword {:?}", config.keyword))?;
    info!("Keyword {:?} has marker {}", config.keyword, filter.marker());

    let decoder = build_decoder(&config).context("Failed to set up the decoder client")?;

    let sink = OutputSink::create(&config.output_path, config.flush_batch_size)
        .context("Failed to prepare the output file")?;

    let source: Box<dyn RecordSource> = match &config.replay_file {
        Some(path) => Box::new(ReplaySource::from_file(path, config.topic.clone()).await?),
        None => Box::new(
            KafkaSource::connect(&config.consumer_config())
                .context("Failed to connect to Kafka")?,
        ),
    };

    let extractor = Extractor::new(
        source,
        LineDecoder::new(decoder),
        filter,
        sink,
        CommitCoordinator::new(config.commit_every),
        config.extract_settings(),
    );
    let summary = extractor.run(shutdown).await?;

    if let Some(path) = &config.emit_summary {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        info!("Run summary written to {}", path.display());
    }

    Ok(summary)
}
