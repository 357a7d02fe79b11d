//! Prowlarr client setup and search queries

use crate::error::{IndexerError, IndexerResult};
use crate::model::{Indexer, IndexerResponse, Torrent};
use std::time::Duration;
use tracing::debug;

const MOVIES_CATEGORY: &str = "2000";
const TV_CATEGORY: &str = "5000";

/// Prowlarr API client.
///
/// Redirects are disabled on the underlying HTTP client: download links
/// frequently answer with a redirect to a magnet URI, which must be read
/// from the `Location` header rather than followed.
#[derive(Clone)]
pub struct Prowlarr {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Prowlarr {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build prowlarr http client");

        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// List all enabled indexers
    pub async fn get_all_indexers(&self) -> IndexerResult<Vec<Indexer>> {
        let url = format!("{}/api/v1/indexer", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexerError::Api {
                status: response.status(),
                operation: "list indexers",
            });
        }

        let indexers: Vec<IndexerResponse> = response.json().await?;
        let indexers: Vec<Indexer> = indexers
            .into_iter()
            .map(Indexer::from)
            .filter(|indexer| indexer.enable)
            .collect();

        debug!("Prowlarr reports {} enabled indexers", indexers.len());
        Ok(indexers)
    }

    /// Search movie torrents on one indexer
    pub async fn search_movie_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
    ) -> IndexerResult<Vec<Torrent>> {
        self.search(indexer, name, "movie", MOVIES_CATEGORY, 0).await
    }

    /// Search series torrents on one indexer, starting at `offset`.
    ///
    /// The offset enables a follow-up query when a first page comes back
    /// full; see the indexer's declared [`Indexer::page_limit`].
    pub async fn search_series_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
        offset: u32,
    ) -> IndexerResult<Vec<Torrent>> {
        self.search(indexer, name, "tvsearch", TV_CATEGORY, offset)
            .await
    }

    /// Search torrents for a whole season on one indexer
    pub async fn search_season_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
        season: u32,
    ) -> IndexerResult<Vec<Torrent>> {
        let query = format!("{} S{:02}", name, season);
        self.search(indexer, &query, "tvsearch", TV_CATEGORY, 0).await
    }

    async fn search(
        &self,
        indexer: &Indexer,
        query: &str,
        search_type: &str,
        category: &str,
        offset: u32,
    ) -> IndexerResult<Vec<Torrent>> {
        let url = format!("{}/api/v1/search", self.base_url);
        let indexer_id = indexer.id.to_string();
        let limit = indexer.page_limit.to_string();
        let offset = offset.to_string();

        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("query", query),
                ("type", search_type),
                ("categories", category),
                ("indexerIds", indexer_id.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexerError::Api {
                status: response.status(),
                operation: "search",
            });
        }

        let torrents: Vec<Torrent> = response.json().await?;
        debug!(
            "Found {} torrents for '{}' on {}",
            torrents.len(),
            query,
            indexer.name
        );
        Ok(torrents)
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn indexer() -> Indexer {
        Indexer {
            id: 4,
            name: "Example".into(),
            enable: true,
            page_limit: 100,
        }
    }

    #[tokio::test]
    async fn test_get_all_indexers_filters_disabled() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/indexer")
                .header("X-Api-Key", "secret");
            then.status(200).json_body(serde_json::json!([
                {"id": 1, "name": "Alpha", "enable": true, "capabilities": {"limitsDefault": 50}},
                {"id": 2, "name": "Beta", "enable": false, "capabilities": {}}
            ]));
        });

        let client = Prowlarr::new(server.base_url(), "secret");
        let indexers = client.get_all_indexers().await.unwrap();

        assert_eq!(indexers.len(), 1);
        assert_eq!(indexers[0].name, "Alpha");
        assert_eq!(indexers[0].page_limit, 50);
    }

    #[tokio::test]
    async fn test_search_movie_torrents() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/search")
                .query_param("query", "Mad Max Fury Road")
                .query_param("type", "movie")
                .query_param("categories", "2000")
                .query_param("indexerIds", "4");
            then.status(200).json_body(serde_json::json!([
                {"title": "Mad Max Fury Road 2015 1080p", "guid": "g1", "seeders": 3, "size": 1000}
            ]));
        });

        let client = Prowlarr::new(server.base_url(), "secret");
        let torrents = client
            .search_movie_torrents(&indexer(), "Mad Max Fury Road")
            .await
            .unwrap();

        assert_eq!(torrents.len(), 1);
        assert_eq!(torrents[0].seeders, 3);
    }

    #[tokio::test]
    async fn test_search_season_query_includes_padded_season() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/search")
                .query_param("query", "Summer House S08")
                .query_param("type", "tvsearch")
                .query_param("categories", "5000");
            then.status(200).json_body(serde_json::json!([]));
        });

        let client = Prowlarr::new(server.base_url(), "secret");
        let torrents = client
            .search_season_torrents(&indexer(), "Summer House", 8)
            .await
            .unwrap();

        mock.assert();
        assert!(torrents.is_empty());
    }

    #[tokio::test]
    async fn test_search_error_status_maps_to_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/search");
            then.status(500);
        });

        let client = Prowlarr::new(server.base_url(), "secret");
        let result = client.search_movie_torrents(&indexer(), "anything").await;
        assert!(matches!(result, Err(IndexerError::Api { .. })));
    }
}
