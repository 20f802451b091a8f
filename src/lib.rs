//! headline-extractor library
//!
//! Bounded extraction of keyword-matching headlines from a Kafka topic whose
//! records are morse encoded.
//!
//! # Crates
//!
//! - `headline_extractor_morse` - encoding table, decoder clients, line
//!   decoder and match filter
//! - `headline_extractor_kafka_source` - the consumer loop, output sink and
//!   offset commits
//!
//! # CLI Usage
//!
//! ```bash
//! # First 1000 headlines mentioning australia, decoded locally
//! headline-extractor extract --brokers localhost:9092
//!
//! # Same, decoding every token through the translate service
//! headline-extractor extract --decoder http \
//!   --decoder-url http://localhost:8083/kafka-coding-challenge/translate
//!
//! # Inspect payloads by hand
//! headline-extractor encode "australia wins"
//! headline-extractor decode ".- ..- ... - .-. .- .-.. .. .-/.-- .. -. ..."
//! ```

pub use headline_extractor_kafka_source as kafka;
pub use headline_extractor_morse as morse;

pub use kafka::{run_extraction, Config, RunOutcome, RunSummary};
