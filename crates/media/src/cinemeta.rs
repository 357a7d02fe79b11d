//! Cinemeta metadata client.
//!
//! Cinemeta is the public Stremio metadata service. It resolves an IMDb
//! id to the canonical name and release window of a movie or series,
//! which drive torrent filtering downstream. No API key is required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const CINEMETA_BASE_URL: &str = "https://v3-cinemeta.strem.io";

/// Canonical metadata for a movie or series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    /// IMDb id with the `tt` prefix
    pub imdb_id: String,
    /// Numeric part of the IMDb id; 0 when unparsable
    pub imdb_numeric: u64,
    /// Canonical name
    pub name: String,
    /// First year of the release window
    pub from_year: i32,
    /// Last year of the release window; `i32::MAX` while still running
    pub to_year: i32,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    meta: MetaPayload,
}

#[derive(Debug, Deserialize)]
struct MetaPayload {
    #[serde(default)]
    imdb_id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "releaseInfo")]
    release_info: String,
}

/// Cinemeta client
pub struct CineMeta {
    http_client: reqwest::Client,
    base_url: String,
}

impl CineMeta {
    /// Create a client against the public Cinemeta service
    pub fn new() -> Self {
        Self::with_base_url(CINEMETA_BASE_URL)
    }

    /// Create a client against a specific base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build cinemeta http client");

        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// Fetch metadata for a movie
    pub async fn movie(&self, imdb_id: &str) -> Result<MetaInfo> {
        self.fetch("movie", imdb_id).await
    }

    /// Fetch metadata for a series
    pub async fn series(&self, imdb_id: &str) -> Result<MetaInfo> {
        self.fetch("series", imdb_id).await
    }

    async fn fetch(&self, kind: &str, imdb_id: &str) -> Result<MetaInfo> {
        let url = format!("{}/meta/{}/{}.json", self.base_url, kind, imdb_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to reach Cinemeta")?;

        if !response.status().is_success() {
            anyhow::bail!("Cinemeta returned {} for {}", response.status(), imdb_id);
        }

        let payload: MetaResponse = response
            .json()
            .await
            .context("Failed to decode Cinemeta response")?;

        tracing::debug!("Resolved {} to '{}'", imdb_id, payload.meta.name);

        let (from_year, to_year) = parse_release_window(&payload.meta.release_info);
        let id = if payload.meta.imdb_id.is_empty() {
            imdb_id.to_string()
        } else {
            payload.meta.imdb_id
        };

        Ok(MetaInfo {
            imdb_numeric: imdb_numeric(&id),
            imdb_id: id,
            name: payload.meta.name,
            from_year,
            to_year,
        })
    }
}

impl Default for CineMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric part of a `tt…` IMDb id; 0 when unparsable
pub fn imdb_numeric(imdb_id: &str) -> u64 {
    imdb_id
        .trim_start_matches("tt")
        .parse()
        .unwrap_or_default()
}

/// Parse a Cinemeta release window.
///
/// Accepts "2015" (single year), "2013-2018" (closed range) and
/// "2015-" (still running). Anything unparsable yields the widest
/// window, so filtering degrades to a no-op rather than dropping
/// everything.
fn parse_release_window(release_info: &str) -> (i32, i32) {
    let release_info = release_info.trim();
    if release_info.is_empty() {
        return (0, i32::MAX);
    }

    match release_info.split_once('-') {
        None => match release_info.parse::<i32>() {
            Ok(year) => (year, year),
            Err(_) => (0, i32::MAX),
        },
        Some((from, to)) => {
            let from_year = from.trim().parse::<i32>().unwrap_or(0);
            let to_year = match to.trim().parse::<i32>() {
                Ok(year) => year,
                Err(_) => i32::MAX,
            };
            (from_year, to_year)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_parse_release_window() {
        assert_eq!(parse_release_window("2015"), (2015, 2015));
        assert_eq!(parse_release_window("2013-2018"), (2013, 2018));
        assert_eq!(parse_release_window("2015-"), (2015, i32::MAX));
        assert_eq!(parse_release_window(""), (0, i32::MAX));
        assert_eq!(parse_release_window("unknown"), (0, i32::MAX));
    }

    #[test]
    fn test_imdb_numeric() {
        assert_eq!(imdb_numeric("tt1392190"), 1392190);
        assert_eq!(imdb_numeric("not-an-id"), 0);
    }

    #[tokio::test]
    async fn test_fetch_movie_metadata() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/meta/movie/tt1392190.json");
            then.status(200).json_body(serde_json::json!({
                "meta": {
                    "imdb_id": "tt1392190",
                    "name": "Mad Max: Fury Road",
                    "releaseInfo": "2015"
                }
            }));
        });

        let client = CineMeta::with_base_url(server.base_url());
        let meta = client.movie("tt1392190").await.unwrap();

        assert_eq!(meta.name, "Mad Max: Fury Road");
        assert_eq!(meta.imdb_numeric, 1392190);
        assert_eq!(meta.from_year, 2015);
        assert_eq!(meta.to_year, 2015);
    }

    #[tokio::test]
    async fn test_fetch_series_release_window() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/meta/series/tt2141913.json");
            then.status(200).json_body(serde_json::json!({
                "meta": {
                    "imdb_id": "tt2141913",
                    "name": "Summer House",
                    "releaseInfo": "2017-"
                }
            }));
        });

        let client = CineMeta::with_base_url(server.base_url());
        let meta = client.series("tt2141913").await.unwrap();

        assert_eq!(meta.from_year, 2017);
        assert_eq!(meta.to_year, i32::MAX);
    }
}
