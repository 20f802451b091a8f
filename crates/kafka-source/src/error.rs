use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Each variant names the stage that failed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Consumer setup failed: {0}")]
    Connect(String),

    #[error("Poll failed: {0}")]
    Poll(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Output file {} failed: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Replay input {} failed: {source}", path.display())]
    Replay {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
