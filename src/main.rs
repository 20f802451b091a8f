//! Command-line interface for headline-extractor
//!
//! # Usage Examples
//!
//! ## Extraction
//! ```bash
//! # First 1000 headlines mentioning "australia"
//! headline-extractor extract \
//!   --brokers localhost:9092 \
//!   --topic au.com.eliiza.newsheadlines.txt \
//!   --output-path newsheadlines_first_1000.txt
//!
//! # Decode through the remote translate service with retries
//! headline-extractor extract --decoder http --decoder-retries 5 --decoder-cache
//!
//! # Offline run over a file of payloads
//! headline-extractor extract --replay-file payloads.txt --exit-on-eof
//! ```
//!
//! ## Payload tools
//! ```bash
//! headline-extractor encode "australia wins"
//! headline-extractor decode ".- ..- ... - .-. .- .-.. .. .-/.-- .. -. ..."
//! ```
//!
//! Logging is controlled with `RUST_LOG`, e.g.
//! `RUST_LOG=headline_extractor_kafka_source=debug`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use headline_extractor::kafka::{self, RunOutcome};
use headline_extractor::morse::{encode_line, LineDecoder, LocalDecoder};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "headline-extractor")]
#[command(about = "Extract keyword-matching morse headlines from a Kafka topic")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the topic and write the first N matching headlines to a file
    Extract {
        #[command(flatten)]
        config: kafka::Config,
    },

    /// Encode a plaintext line into the topic's payload format
    Encode {
        /// Plaintext to encode
        text: String,
    },

    /// Decode a payload with the built-in table
    Decode {
        /// Morse payload (letters separated by spaces, words by '/')
        payload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { config } => extract(config).await,
        Commands::Encode { text } => {
            println!("{}", encode_line(&text)?);
            Ok(())
        }
        Commands::Decode { payload } => {
            let line = LineDecoder::new(LocalDecoder).decode(&payload).await?;
            println!("{}", line.to_lowercase());
            Ok(())
        }
    }
}

async fn extract(config: kafka::Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing the current record");
                trigger.cancel();
            }
            Err(e) => warn!("Cannot listen for interrupts: {e}"),
        }
    });

    let started_at = chrono::Local::now();
    info!(
        "Consumer started at {}",
        started_at.format("%m/%d/%Y, %H:%M:%S")
    );
    let output_path = config.output_path.clone();

    let summary = kafka::run_extraction(config, shutdown)
        .await
        .context("Extraction failed")?;

    let finished_at = chrono::Local::now();
    info!(
        "Consumer finished at {}",
        finished_at.format("%m/%d/%Y, %H:%M:%S")
    );

    let elapsed = summary.elapsed();
    println!(
        "Extracted {} headlines from {} records into {} in {:.2} minutes",
        summary.extracted,
        summary.polled,
        output_path.display(),
        elapsed.num_milliseconds() as f64 / 60_000.0
    );
    match summary.outcome {
        RunOutcome::Completed => {}
        RunOutcome::Interrupted => println!("Run was interrupted before reaching the cap"),
        RunOutcome::EndOfInput => println!("Topic exhausted before reaching the cap"),
    }
    if summary.skipped > 0 {
        println!(
            "{} matching records could not be decoded and were skipped",
            summary.skipped
        );
    }

    Ok(())
}
