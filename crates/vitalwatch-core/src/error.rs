//! Error type for configuration handling and validation.

use std::path::PathBuf;

/// Errors raised by `vitalwatch-core`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
