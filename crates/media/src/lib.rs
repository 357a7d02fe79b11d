//! Media metadata support for the stream-relay service.
//!
//! This crate provides:
//! - Torrent title parsing (resolution, year, quality, codec, audio,
//!   container, 3D flag, season/episode ranges, clean title)
//! - The Cinemeta metadata client
//! - Media file selection inside a torrent's file listing

pub mod cinemeta;
pub mod detector;
pub mod files;

pub use cinemeta::{CineMeta, MetaInfo};
pub use detector::TitleInfo;
pub use files::FileRef;
