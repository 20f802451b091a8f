//! Keyword matching on encoded payloads.
//!
//! Matching compares token sequences, never decoded text, so records that do
//! not match cost no decoder calls.

use crate::error::{DecodeError, Result};
use crate::line::{encode_line, tokenize};

/// Matches payloads containing the encoded keyword as whole words.
///
/// A word group matches only when its tokens are exactly the marker's tokens:
/// the encoding of "australian" starts with the encoding of "australia" but
/// has an extra token, so it does not match. Start and end of payload are
/// word boundaries just like `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFilter {
    marker: Vec<Vec<String>>,
}

impl MatchFilter {
    /// Build a filter from a plaintext keyword (one or more words).
    pub fn for_keyword(keyword: &str) -> Result<Self> {
        Self::from_marker(&encode_line(keyword)?)
    }

    /// Build a filter from an already encoded marker.
    pub fn from_marker(marker: &str) -> Result<Self> {
        let marker: Vec<Vec<String>> = tokenize(marker)
            .into_iter()
            .map(|word| word.into_iter().map(String::from).collect())
            .collect();
        if marker.is_empty() {
            return Err(DecodeError::Malformed(
                "match marker contains no morse tokens".to_string(),
            ));
        }
        Ok(Self { marker })
    }

    /// The marker in payload format.
    pub fn marker(&self) -> String {
        self.marker
            .iter()
            .map(|word| word.join(" "))
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn matches(&self, payload: &str) -> bool {
        let words = tokenize(payload);
        words.windows(self.marker.len()).any(|window| {
            window
                .iter()
                .zip(&self.marker)
                .all(|(word, expected)| word.iter().eq(expected.iter()))
        })
    }
}
