//! Publishes headlines to Kafka as morse payloads.
//!
//! To run this producer:
//! 1. Start Kafka with Docker:
//!    docker run -d --name kafka -p 9092:9092 apache/kafka:latest
//! 2. Publish the built-in fixtures, or a file with one headline per line:
//!    cargo run -p headline-extractor-kafka-producer -- --file headlines.txt
//! 3. Run the extractor in another terminal:
//!    cargo run -- extract --topic au.com.eliiza.newsheadlines.txt

use anyhow::Context;
use clap::Parser;
use headline_extractor_kafka_producer::{publish_test_headlines, HeadlineProducer};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "headline-producer")]
#[command(about = "Publish morse-encoded headlines to a Kafka topic")]
struct Args {
    /// Kafka broker address
    #[arg(long, default_value = "localhost:9092", env = "HEADLINES_BROKERS")]
    broker: String,

    /// Topic to publish to
    #[arg(long, default_value = "au.com.eliiza.newsheadlines.txt")]
    topic: String,

    /// Partitions used when the topic has to be created
    #[arg(long, default_value_t = 1)]
    partitions: i32,

    /// Plaintext headlines, one per line (defaults to the built-in fixtures)
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run_main(Args::parse()).await {
        Ok(count) => println!("Published {count} headlines"),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main(args: Args) -> anyhow::Result<usize> {
    let producer = HeadlineProducer::new(&args.broker).await?;
    producer
        .create_topic_if_not_exists(&args.topic, args.partitions)
        .await?;

    match args.file {
        Some(path) => {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let headlines = contents.lines().filter(|line| !line.trim().is_empty());
            producer.publish_headlines(&args.topic, headlines).await
        }
        None => publish_test_headlines(&producer, &args.topic).await,
    }
}
