//! Decoder client capability: one encoded token in, one plaintext token out.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::table;

/// Translates a single morse token into its plaintext equivalent.
///
/// The line decoder only talks to this trait, so the remote service can be
/// swapped for the local table (or a test double) without touching it.
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode_token(&self, token: &str) -> Result<String>;
}

#[async_trait]
impl<D: TokenDecoder + ?Sized> TokenDecoder for Box<D> {
    async fn decode_token(&self, token: &str) -> Result<String> {
        (**self).decode_token(token).await
    }
}

#[async_trait]
impl<D: TokenDecoder + ?Sized> TokenDecoder for Arc<D> {
    async fn decode_token(&self, token: &str) -> Result<String> {
        (**self).decode_token(token).await
    }
}

/// Decodes tokens with the built-in table, no network involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDecoder;

#[async_trait]
impl TokenDecoder for LocalDecoder {
    async fn decode_token(&self, token: &str) -> Result<String> {
        table::decode_token(token)
            .map(String::from)
            .ok_or_else(|| DecodeError::UnknownToken(token.to_string()))
    }
}

/// Memoizes successful lookups of an inner decoder.
///
/// Only valid because the encoding is context-free. Failures are not cached,
/// so a transient outage does not poison later lookups.
pub struct CachedDecoder<D> {
    inner: D,
    cache: Mutex<HashMap<String, String>>,
}

impl<D: TokenDecoder> CachedDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct tokens currently cached
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, token: &str) -> Option<String> {
        self.cache.lock().ok()?.get(token).cloned()
    }
}

#[async_trait]
impl<D: TokenDecoder> TokenDecoder for CachedDecoder<D> {
    async fn decode_token(&self, token: &str) -> Result<String> {
        if let Some(hit) = self.cached(token) {
            trace!("Cache hit for token {token}");
            return Ok(hit);
        }

        let decoded = self.inner.decode_token(token).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(token.to_string(), decoded.clone());
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts lookups and refuses every token in `failing`.
    struct CountingDecoder {
        calls: AtomicUsize,
        failing: &'static str,
    }

    #[async_trait]
    impl TokenDecoder for CountingDecoder {
        async fn decode_token(&self, token: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == self.failing {
                return Err(DecodeError::UnknownToken(token.to_string()));
            }
            LocalDecoder.decode_token(token).await
        }
    }

    #[tokio::test]
    async fn test_local_decoder() {
        assert_eq!(LocalDecoder.decode_token("...").await.unwrap(), "S");
        let err = LocalDecoder.decode_token("........").await.unwrap_err();
        assert!(matches!(err, DecodeError::UnknownToken(t) if t == "........"));
    }

    #[tokio::test]
    async fn test_cached_decoder_hits_inner_once() {
        let decoder = CachedDecoder::new(CountingDecoder {
            calls: AtomicUsize::new(0),
            failing: "",
        });

        for _ in 0..5 {
            assert_eq!(decoder.decode_token(".-").await.unwrap(), "A");
        }
        assert_eq!(decoder.decode_token("-").await.unwrap(), "T");

        assert_eq!(decoder.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(decoder.len(), 2);
    }

    #[tokio::test]
    async fn test_cached_decoder_does_not_cache_failures() {
        let decoder = CachedDecoder::new(CountingDecoder {
            calls: AtomicUsize::new(0),
            failing: "-.-.-.-.",
        });

        assert!(decoder.decode_token("-.-.-.-.").await.is_err());
        assert!(decoder.decode_token("-.-.-.-.").await.is_err());

        assert_eq!(decoder.inner.calls.load(Ordering::SeqCst), 2);
        assert!(decoder.is_empty());
    }

    #[tokio::test]
    async fn test_boxed_decoder() {
        let decoder: Box<dyn TokenDecoder> = Box::new(LocalDecoder);
        assert_eq!(decoder.decode_token("--").await.unwrap(), "M");
    }
}
