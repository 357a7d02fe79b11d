//! Collaborator interfaces.
//!
//! The result-assembly pipeline talks to its collaborators through
//! traits so the wiring stays testable; the production implementations
//! are thin passthroughs to the client crates.

use async_trait::async_trait;
use debrid::{CachedFile, DebridResult, RealDebrid};
use indexer::{Indexer, Prowlarr, Torrent};
use media::{CineMeta, MetaInfo};
use shared::FingerprintCache;
use std::collections::HashMap;

/// Torrent search backend (Prowlarr)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TorrentSearcher: Send + Sync {
    async fn get_all_indexers(&self) -> anyhow::Result<Vec<Indexer>>;

    async fn search_movie_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
    ) -> anyhow::Result<Vec<Torrent>>;

    async fn search_series_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
        offset: u32,
    ) -> anyhow::Result<Vec<Torrent>>;

    async fn search_season_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
        season: u32,
    ) -> anyhow::Result<Vec<Torrent>>;

    async fn fetch_info_hash(
        &self,
        torrent: &Torrent,
        cache: &FingerprintCache,
    ) -> anyhow::Result<String>;
}

/// Debrid cache and redemption backend (Real-Debrid)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DebridService: Send + Sync {
    async fn get_files(
        &self,
        info_hashes: &[String],
    ) -> DebridResult<HashMap<String, Vec<CachedFile>>>;

    async fn get_download_by_info_hash(
        &self,
        info_hash: &str,
        file_id: i64,
        client_ip: &str,
    ) -> DebridResult<String>;
}

/// Content metadata backend (Cinemeta)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetaProvider: Send + Sync {
    async fn movie(&self, imdb_id: &str) -> anyhow::Result<MetaInfo>;

    async fn series(&self, imdb_id: &str) -> anyhow::Result<MetaInfo>;
}

#[async_trait]
impl TorrentSearcher for Prowlarr {
    async fn get_all_indexers(&self) -> anyhow::Result<Vec<Indexer>> {
        Ok(Prowlarr::get_all_indexers(self).await?)
    }

    async fn search_movie_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
    ) -> anyhow::Result<Vec<Torrent>> {
        Ok(Prowlarr::search_movie_torrents(self, indexer, name).await?)
    }

    async fn search_series_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
        offset: u32,
    ) -> anyhow::Result<Vec<Torrent>> {
        Ok(Prowlarr::search_series_torrents(self, indexer, name, offset).await?)
    }

    async fn search_season_torrents(
        &self,
        indexer: &Indexer,
        name: &str,
        season: u32,
    ) -> anyhow::Result<Vec<Torrent>> {
        Ok(Prowlarr::search_season_torrents(self, indexer, name, season).await?)
    }

    async fn fetch_info_hash(
        &self,
        torrent: &Torrent,
        cache: &FingerprintCache,
    ) -> anyhow::Result<String> {
        Ok(Prowlarr::fetch_info_hash(self, torrent, cache).await?)
    }
}

#[async_trait]
impl DebridService for RealDebrid {
    async fn get_files(
        &self,
        info_hashes: &[String],
    ) -> DebridResult<HashMap<String, Vec<CachedFile>>> {
        RealDebrid::get_files(self, info_hashes).await
    }

    async fn get_download_by_info_hash(
        &self,
        info_hash: &str,
        file_id: i64,
        client_ip: &str,
    ) -> DebridResult<String> {
        RealDebrid::get_download_by_info_hash(self, info_hash, file_id, client_ip).await
    }
}

#[async_trait]
impl MetaProvider for CineMeta {
    async fn movie(&self, imdb_id: &str) -> anyhow::Result<MetaInfo> {
        CineMeta::movie(self, imdb_id).await
    }

    async fn series(&self, imdb_id: &str) -> anyhow::Result<MetaInfo> {
        CineMeta::series(self, imdb_id).await
    }
}
