//! Prowlarr indexer integration.
//!
//! This crate wraps the Prowlarr aggregator API:
//! - Listing enabled indexers
//! - Searching movie, series and season torrents per indexer
//! - Resolving a search hit to its BitTorrent infohash, via the cached
//!   magnet, the magnet redirect behind the download link, or the
//!   `.torrent` file itself

pub mod client;
pub mod enrich;
pub mod error;
pub mod magnet;
pub mod metainfo;
pub mod model;

pub use client::Prowlarr;
pub use error::{IndexerError, IndexerResult};
pub use model::{Indexer, Torrent};
