//! Kafka extraction E2E test
//!
//! Publishes morse-encoded fixture headlines to a fresh topic and runs a full
//! extraction against a real broker.
//!
//! Requires a broker at `HEADLINES_TEST_BROKER` (default `kafka:9092`):
//!   cargo test --test e2e_kafka -- --ignored

use headline_extractor::{run_extraction, Config, RunOutcome};
use headline_extractor_kafka_producer::{publish_test_headlines, test_headlines, HeadlineProducer};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn broker() -> String {
    std::env::var("HEADLINES_TEST_BROKER").unwrap_or_else(|_| "kafka:9092".to_string())
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn test_kafka_bounded_extraction() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("headline_extractor=debug,headline_extractor_kafka_source=debug")
        .try_init()
        .ok();

    let run_id = std::process::id();
    let topic = format!("test-headlines-{run_id}");
    let group_id = format!("test-headlines-group-{run_id}");
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("headlines.txt");

    let producer = HeadlineProducer::new(&broker()).await?;
    producer.create_topic_if_not_exists(&topic, 1).await?;
    sleep(Duration::from_millis(500)).await;
    publish_test_headlines(&producer, &topic).await?;

    let expected: Vec<String> = test_headlines()
        .iter()
        .filter(|h| h.mentions_australia)
        .map(|h| h.text.to_lowercase())
        .collect();
    let cap = expected.len() - 1;

    let config = <Config as clap::Parser>::parse_from([
        "extract".to_string(),
        "--brokers".to_string(),
        broker(),
        "--topic".to_string(),
        topic,
        "--group-id".to_string(),
        group_id,
        "--fetch-min-bytes".to_string(),
        "1".to_string(),
        "--max-extracted".to_string(),
        cap.to_string(),
        "--output-path".to_string(),
        output.display().to_string(),
    ]);

    let summary = tokio::time::timeout(
        Duration::from_secs(60),
        run_extraction(config, CancellationToken::new()),
    )
    .await??;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.extracted, cap as u64);
    assert!(summary.final_commit);

    let lines: Vec<String> = std::fs::read_to_string(&output)?
        .lines()
        .map(String::from)
        .collect();
    assert_eq!(lines, expected[..cap].to_vec());

    Ok(())
}
