//! Real-Debrid integration.
//!
//! This crate wraps the Real-Debrid REST API:
//! - Batched instant-availability lookups (which files of a torrent the
//!   provider already has materialised)
//! - Redeeming an `(infohash, file id)` pair into a direct download URL
//!   by driving the provider through add magnet -> select files -> wait
//!   downloaded -> unrestrict

pub mod client;
pub mod error;
pub mod model;

pub use client::RealDebrid;
pub use error::{DebridError, DebridResult};
pub use model::{CachedFile, DebridTorrent, TorrentFile};
