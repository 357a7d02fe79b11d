//! Data transfer objects for the Real-Debrid API

use serde::Deserialize;

/// Torrent status while the provider still materialises it
pub const STATUS_WAITING_FILES_SELECTION: &str = "waiting_files_selection";

/// Terminal torrent status
pub const STATUS_DOWNLOADED: &str = "downloaded";

/// A file the provider already has materialised for a torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    /// Provider-side file id, as it appears in the availability map
    pub id: String,
    pub filename: String,
    pub filesize: u64,
}

/// Remote torrent object tracked by the redemption state machine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebridTorrent {
    pub id: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub files: Vec<TorrentFile>,
    /// Hoster links, one per selected file, in file order
    #[serde(default)]
    pub links: Vec<String>,
}

/// One file inside a remote torrent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentFile {
    pub id: i64,
    #[serde(default)]
    pub path: String,
    /// Non-zero when the file is part of the selection
    #[serde(default)]
    pub selected: i64,
    #[serde(default)]
    pub bytes: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddMagnetResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnrestrictResponse {
    pub download: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: i64,
}
