//! Headline fixtures for Kafka integration tests
//!
//! A mix of headlines that mention the target keyword as a whole word and
//! near misses whose encoding starts with the same tokens.

use crate::HeadlineProducer;

#[derive(Debug, Clone, Copy)]
pub struct TestHeadline {
    pub text: &'static str,
    /// Whether the extractor is expected to keep it for keyword "australia"
    pub mentions_australia: bool,
}

const HEADLINES: &[TestHeadline] = &[
    TestHeadline {
        text: "Australia wins the ashes series",
        mentions_australia: true,
    },
    TestHeadline {
        text: "Australian open draws record crowds",
        mentions_australia: false,
    },
    TestHeadline {
        text: "Rates on hold as inflation eases",
        mentions_australia: false,
    },
    TestHeadline {
        text: "Bushfire warning for south Australia",
        mentions_australia: true,
    },
    TestHeadline {
        text: "Australians abroad urged to register",
        mentions_australia: false,
    },
    TestHeadline {
        text: "Australia and New Zealand sign trade deal",
        mentions_australia: true,
    },
    TestHeadline {
        text: "Cyclone crosses the coast near Broome",
        mentions_australia: false,
    },
];

pub fn test_headlines() -> &'static [TestHeadline] {
    HEADLINES
}

/// Publish the fixture headlines to `topic`, in order
pub async fn publish_test_headlines(producer: &HeadlineProducer, topic: &str) -> anyhow::Result<usize> {
    let count = producer
        .publish_headlines(topic, HEADLINES.iter().map(|h| h.text))
        .await?;
    tracing::debug!("Published {count} test headlines to {topic}");
    Ok(count)
}
