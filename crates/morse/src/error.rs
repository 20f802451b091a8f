use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unknown morse token: {0:?}")]
    UnknownToken(String),

    #[error("Character {0:?} has no morse encoding")]
    Unencodable(char),

    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Decoding service failed for token {token:?} after {attempts} attempt(s): {source}")]
    Service {
        token: String,
        attempts: u32,
        #[source]
        source: TransientNetworkError,
    },

    #[error("Failed to build decoding service client: {0}")]
    ClientBuild(String),
}

/// Failure of a single request to the decoding service. Always retryable.
#[derive(Error, Debug)]
pub enum TransientNetworkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service responded with status {0}")]
    Status(reqwest::StatusCode),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
