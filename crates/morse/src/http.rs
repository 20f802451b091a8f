//! Remote decoding service client.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::TokenDecoder;
use crate::error::{DecodeError, Result, TransientNetworkError};

/// Query parameter carrying the raw token
pub const TOKEN_QUERY_PARAM: &str = "morse-code";

/// Retry budget for transient service failures.
///
/// Attempt `n` (zero based) waits `initial * 2^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, initial_backoff: Duration) -> Self {
        Self {
            retries,
            initial_backoff,
            max_backoff: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

/// Decodes tokens with one GET request per token:
/// `{base_url}?morse-code={token}`, plaintext in the response body.
pub struct HttpDecoder {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpDecoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecodeError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            retry,
        })
    }

    async fn fetch(&self, token: &str) -> std::result::Result<String, TransientNetworkError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[(TOKEN_QUERY_PARAM, token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransientNetworkError::Status(status));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl TokenDecoder for HttpDecoder {
    async fn decode_token(&self, token: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.fetch(token).await {
                Ok(body) => {
                    let plain = body.trim_end_matches(['\r', '\n']);
                    if plain.is_empty() {
                        return Err(DecodeError::UnknownToken(token.to_string()));
                    }
                    debug!("Decoded token {token} -> {plain}");
                    return Ok(plain.to_string());
                }
                Err(e) if attempt < self.retry.retries => {
                    let delay = self.retry.backoff_for(attempt);
                    warn!(
                        "Decoding service call for {token} failed ({e}), retrying in {delay:?} ({}/{})",
                        attempt + 1,
                        self.retry.retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(DecodeError::Service {
                        token: token.to_string(),
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal translate service on a random port. The first `fail_first`
    /// requests get a 503.
    async fn spawn_service(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 4096];
                let read = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let token = request
                    .split_whitespace()
                    .nth(1)
                    .and_then(|target| target.split("morse-code=").nth(1))
                    .unwrap_or_default()
                    .to_string();

                let (status, body) = if n < fail_first {
                    ("503 Service Unavailable", String::new())
                } else {
                    match table::decode_token(&token) {
                        Some(c) => ("200 OK", c.to_string()),
                        None => ("404 Not Found", String::new()),
                    }
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (
            format!("http://{addr}/kafka-coding-challenge/translate"),
            hits,
        )
    }

    fn fast_retry(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(500));
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_decodes_via_service() {
        let (url, hits) = spawn_service(0).await;
        let decoder = HttpDecoder::new(url, Duration::from_secs(5), fast_retry(0)).unwrap();

        assert_eq!(decoder.decode_token(".-").await.unwrap(), "A");
        assert_eq!(decoder.decode_token("-.--.-").await.unwrap(), ")");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let (url, hits) = spawn_service(2).await;
        let decoder = HttpDecoder::new(url, Duration::from_secs(5), fast_retry(3)).unwrap();

        assert_eq!(decoder.decode_token("...").await.unwrap(), "S");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let (url, hits) = spawn_service(10).await;
        let decoder = HttpDecoder::new(url, Duration::from_secs(5), fast_retry(2)).unwrap();

        let err = decoder.decode_token("...").await.unwrap_err();
        match err {
            DecodeError::Service {
                token,
                attempts,
                source: TransientNetworkError::Status(status),
            } => {
                assert_eq!(token, "...");
                assert_eq!(attempts, 3);
                assert_eq!(status.as_u16(), 503);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_service_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let decoder = HttpDecoder::new(
            format!("http://{addr}/translate"),
            Duration::from_secs(1),
            fast_retry(1),
        )
        .unwrap();

        assert!(matches!(
            decoder.decode_token(".-").await,
            Err(DecodeError::Service { attempts: 2, .. })
        ));
    }
}
