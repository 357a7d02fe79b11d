//! Error types for the indexer crate

use thiserror::Error;

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Error types that can occur while talking to Prowlarr
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Prowlarr returned {status} for {operation}")]
    Api {
        status: reqwest::StatusCode,
        operation: &'static str,
    },

    #[error("Invalid magnet URI: {0}")]
    InvalidMagnet(String),

    #[error("Invalid torrent file: {0}")]
    InvalidMetainfo(String),

    #[error("No info hash could be resolved for {0}")]
    NoInfoHash(String),
}
