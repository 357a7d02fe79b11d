//! The Stremio addon service.
//!
//! Composes the title parser, the pipeline engine, the indexer and
//! debrid clients into the two request flows:
//! - stream search (ranked list of playable streams for a content id)
//! - download redemption (one `(infohash, file id)` pair into a direct
//!   download URL)

pub mod clients;
pub mod filters;
pub mod manifest;
pub mod rank;
pub mod streams;
pub mod userdata;

pub use clients::{DebridService, MetaProvider, TorrentSearcher};
pub use manifest::{Manifest, StreamItem, StreamsResponse};
pub use streams::StreamRecord;
pub use userdata::UserData;

use dashmap::DashMap;
use debrid::DebridError;
use manifest::{CatalogItem, ManifestBehaviorHints, ResourceItem};
use shared::cache::DOWNLOAD_URL_TTL;
use shared::error::{AppError, AppResult};
use shared::types::{ContentType, StreamId};
use shared::FingerprintCache;
use std::sync::Arc;
use streams::StreamsContext;
use tracing::debug;

/// Default number of streams returned per request
pub const DEFAULT_MAX_RESULTS: usize = 5;

const DOWNLOAD_CACHE_KIND: &str = "dl";

/// Static identity and behaviour knobs of the addon
#[derive(Debug, Clone)]
pub struct AddonOptions {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub max_results: usize,
}

impl Default for AddonOptions {
    fn default() -> Self {
        Self {
            id: "stremio.addon.stream-relay".to_string(),
            name: "Stream Relay".to_string(),
            description: "Debrid-backed torrent streams via Prowlarr".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Everything the stream search needs beyond the addon itself: the id
/// being requested, request-derived URL/IP data, and the per-request
/// collaborator clients
pub struct StreamsRequest {
    pub stream_id: StreamId,
    /// `scheme://host/{userData}` prefix for download URLs
    pub base_url: String,
    pub client_ip: String,
    pub searcher: Arc<dyn TorrentSearcher>,
    pub debrid: Arc<dyn DebridService>,
}

/// The addon service shared across requests
pub struct Addon {
    options: AddonOptions,
    metadata: Arc<dyn MetaProvider>,
    cache: Arc<FingerprintCache>,
}

impl Addon {
    pub fn new(
        options: AddonOptions,
        metadata: Arc<dyn MetaProvider>,
        cache: Arc<FingerprintCache>,
    ) -> Self {
        Self {
            options,
            metadata,
            cache,
        }
    }

    /// The addon manifest
    pub fn manifest(&self) -> Manifest {
        Manifest {
            id: self.options.id.clone(),
            name: self.options.name.clone(),
            description: self.options.description.clone(),
            version: self.options.version.clone(),
            resources: vec![ResourceItem {
                name: "stream".to_string(),
                types: vec![ContentType::Movie, ContentType::Series],
                id_prefixes: vec!["tt".to_string()],
            }],
            types: vec![ContentType::Movie, ContentType::Series],
            catalogs: Vec::<CatalogItem>::new(),
            id_prefixes: vec!["tt".to_string()],
            behavior_hints: ManifestBehaviorHints {
                configurable: true,
                configuration_required: true,
            },
        }
    }

    /// Search all indexers and return up to `max_results` ranked
    /// streams. An empty list is a valid answer; engine failures are
    /// logged, not surfaced.
    pub async fn streams(&self, request: StreamsRequest) -> Vec<StreamItem> {
        let ctx = Arc::new(StreamsContext {
            searcher: request.searcher,
            debrid: request.debrid,
            metadata: self.metadata.clone(),
            cache: self.cache.clone(),
            seen_hashes: DashMap::new(),
            addon_name: self.options.name.clone(),
        });

        streams::collect_streams(
            ctx,
            request.stream_id,
            request.base_url,
            request.client_ip,
            self.options.max_results,
        )
        .await
    }

    /// Redeem one result into a direct download URL, memoised briefly
    /// so duplicate redemptions collapse into one provider round-trip
    pub async fn resolve_download(
        &self,
        debrid: Arc<dyn DebridService>,
        api_key: &str,
        info_hash: &str,
        file_id: i64,
        client_ip: &str,
    ) -> AppResult<String> {
        let cache_key = FingerprintCache::make_key(
            DOWNLOAD_CACHE_KIND,
            &format!("{}{}{}", api_key, info_hash, file_id),
        );

        if let Some(url) = self.cache.get(&cache_key) {
            debug!("Serving memoised download url for {}", info_hash);
            return Ok(url);
        }

        let url = debrid
            .get_download_by_info_hash(info_hash, file_id, client_ip)
            .await
            .map_err(map_debrid_error)?;

        self.cache.set(&cache_key, &url, DOWNLOAD_URL_TTL);
        Ok(url)
    }
}

fn map_debrid_error(err: DebridError) -> AppError {
    if err.is_retriable() {
        AppError::NotReady(err.to_string())
    } else {
        AppError::UpstreamFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MockDebridService, MockMetaProvider};

    fn addon() -> Addon {
        Addon::new(
            AddonOptions::default(),
            Arc::new(MockMetaProvider::new()),
            Arc::new(FingerprintCache::default()),
        )
    }

    #[test]
    fn test_manifest_shape() {
        let manifest = addon().manifest();
        assert_eq!(manifest.resources.len(), 1);
        assert_eq!(manifest.resources[0].name, "stream");
        assert!(manifest.behavior_hints.configuration_required);
        assert!(manifest.catalogs.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_download_memoises() {
        let addon = addon();

        let mut debrid = MockDebridService::new();
        debrid
            .expect_get_download_by_info_hash()
            .times(1)
            .returning(|_, _, _| Ok("https://dl.example/file.mkv".to_string()));
        let debrid: Arc<dyn DebridService> = Arc::new(debrid);

        let first = addon
            .resolve_download(debrid.clone(), "key", "abc", 2, "1.2.3.4")
            .await
            .unwrap();
        let second = addon
            .resolve_download(debrid.clone(), "key", "abc", 2, "1.2.3.4")
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_download_classifies_errors() {
        let addon = addon();

        let mut debrid = MockDebridService::new();
        debrid
            .expect_get_download_by_info_hash()
            .returning(|hash, _, _| Err(DebridError::NotReady(hash.to_string())));
        let debrid: Arc<dyn DebridService> = Arc::new(debrid);

        let result = addon
            .resolve_download(debrid, "key", "abc", 2, "")
            .await;
        assert!(matches!(result, Err(AppError::NotReady(_))));

        let mut debrid = MockDebridService::new();
        debrid
            .expect_get_download_by_info_hash()
            .returning(|hash, _, _| Err(DebridError::NoFile(hash.to_string())));
        let debrid: Arc<dyn DebridService> = Arc::new(debrid);

        let result = addon.resolve_download(debrid, "key", "def", 2, "").await;
        assert!(matches!(result, Err(AppError::UpstreamFailed(_))));
    }
}
