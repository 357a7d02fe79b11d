//! Error types for the debrid crate

use thiserror::Error;

/// Result type alias for debrid operations
pub type DebridResult<T> = Result<T, DebridError>;

/// Error types that can occur while driving the debrid provider.
///
/// The classification matters to callers: `NotReady` is retriable by
/// the client, `NoTorrent`/`NoFile` are terminal for the request, and
/// `Transport`/`Remote` indicate provider trouble.
#[derive(Error, Debug)]
pub enum DebridError {
    #[error("no torrent found for {0}")]
    NoTorrent(String),

    #[error("no matching file in torrent {0}")]
    NoFile(String),

    #[error("torrent {0} is not ready yet")]
    NotReady(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("debrid api error ({status}): {message} (code {code})")]
    Remote {
        status: u16,
        code: i64,
        message: String,
    },
}

impl DebridError {
    /// Whether the caller may retry the same request later
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}
