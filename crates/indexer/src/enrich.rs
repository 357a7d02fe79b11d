//! Infohash resolution for search hits.
//!
//! Indexers rarely hand the infohash over directly. Resolution walks a
//! ladder of sources, cheapest first:
//!
//! 1. The infohash already on the search hit
//! 2. The fingerprint cache, keyed by the indexer-supplied guid
//! 3. The magnet URI on the search hit
//! 4. The download link: either a redirect to a magnet URI (read from
//!    the `Location` header, never followed) or the `.torrent` file
//!    itself, hashed over its info dictionary
//!
//! Resolved hashes are written back to the fingerprint cache so repeat
//! requests skip the network.

use crate::client::Prowlarr;
use crate::error::{IndexerError, IndexerResult};
use crate::magnet::info_hash_from_magnet;
use crate::metainfo::info_hash_from_torrent;
use crate::model::Torrent;
use shared::cache::{FingerprintCache, INFOHASH_TTL};
use tracing::debug;

const GID_CACHE_KIND: &str = "gid";
const MAX_LINK_HOPS: usize = 3;

impl Prowlarr {
    /// Resolve the infohash for a search hit, consulting and feeding the
    /// fingerprint cache
    pub async fn fetch_info_hash(
        &self,
        torrent: &Torrent,
        cache: &FingerprintCache,
    ) -> IndexerResult<String> {
        if let Some(hash) = &torrent.info_hash {
            return Ok(hash.to_lowercase());
        }

        let cache_key = (!torrent.guid.is_empty())
            .then(|| FingerprintCache::make_key(GID_CACHE_KIND, &torrent.guid));

        if let Some(key) = &cache_key {
            if let Some(cached) = cache.get(key) {
                // the cache may hold either a magnet or a bare infohash
                if cached.starts_with("magnet:") {
                    return info_hash_from_magnet(&cached);
                }
                return Ok(cached);
            }
        }

        let hash = self.resolve_info_hash(torrent).await?;

        if let Some(key) = &cache_key {
            cache.set(key, &hash, INFOHASH_TTL);
        }

        Ok(hash)
    }

    async fn resolve_info_hash(&self, torrent: &Torrent) -> IndexerResult<String> {
        if let Some(magnet_uri) = &torrent.magnet_uri {
            return info_hash_from_magnet(magnet_uri);
        }

        let Some(link) = &torrent.link else {
            return Err(IndexerError::NoInfoHash(torrent.title.clone()));
        };

        let mut url = link.clone();
        for _ in 0..MAX_LINK_HOPS {
            let response = self.http_client().get(&url).send().await?;

            if response.status().is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();

                if location.starts_with("magnet:") {
                    return info_hash_from_magnet(location);
                }
                if location.is_empty() {
                    break;
                }

                debug!("Following download link redirect for {}", torrent.title);
                url = location.to_string();
                continue;
            }

            if response.status().is_success() {
                let bytes = response.bytes().await?;
                return info_hash_from_torrent(&bytes);
            }

            break;
        }

        Err(IndexerError::NoInfoHash(torrent.title.clone()))
    }
}
