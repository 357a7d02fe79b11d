//! Data transfer objects for the Prowlarr API

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_LIMIT: u32 = 100;

/// A configured search backend, as reported by Prowlarr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexer {
    pub id: i64,
    pub name: String,
    pub enable: bool,
    /// Result page size the indexer declares for one query
    pub page_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexerResponse {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub capabilities: IndexerCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexerCapabilities {
    #[serde(default)]
    pub limits_default: Option<u32>,
}

impl From<IndexerResponse> for Indexer {
    fn from(response: IndexerResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            enable: response.enable,
            page_limit: response
                .capabilities
                .limits_default
                .unwrap_or(DEFAULT_PAGE_LIMIT),
        }
    }
}

/// One search hit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Torrent {
    pub title: String,
    /// Opaque indexer-side identifier; stable enough to key the
    /// magnet/infohash cache across requests
    pub guid: String,
    pub seeders: u32,
    pub size: u64,
    /// Numeric IMDb id; 0 when the indexer doesn't know it
    #[serde(rename = "imdbId")]
    pub imdb_id: u64,
    /// Link to the `.torrent` file (or a magnet redirect)
    #[serde(rename = "downloadUrl")]
    pub link: Option<String>,
    #[serde(rename = "magnetUrl")]
    pub magnet_uri: Option<String>,
    pub info_hash: Option<String>,
}

impl Torrent {
    /// Whether the torrent already carries a magnet URI or an infohash
    pub fn has_fingerprint(&self) -> bool {
        self.info_hash.is_some() || self.magnet_uri.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_from_response_defaults_page_limit() {
        let response: IndexerResponse = serde_json::from_value(serde_json::json!({
            "id": 2,
            "name": "Example",
            "enable": true,
            "capabilities": {}
        }))
        .unwrap();
        let indexer = Indexer::from(response);
        assert_eq!(indexer.page_limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn test_torrent_decodes_prowlarr_fields() {
        let torrent: Torrent = serde_json::from_value(serde_json::json!({
            "title": "Mad Max Fury Road 2015 1080p",
            "guid": "https://indexer.example/details/42",
            "seeders": 12,
            "size": 4_000_000_000u64,
            "imdbId": 1392190,
            "downloadUrl": "https://prowlarr.example/download/42",
            "infoHash": "9b4c1489bfccd8205d152345f7a8aad52d9a1f57"
        }))
        .unwrap();

        assert_eq!(torrent.seeders, 12);
        assert_eq!(torrent.imdb_id, 1392190);
        assert!(torrent.has_fingerprint());
    }
}
