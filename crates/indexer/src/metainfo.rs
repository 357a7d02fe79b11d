//! Bencode parsing for `.torrent` files.
//!
//! Only the BitTorrent v1 pieces needed to compute an infohash are
//! modelled: the metainfo wrapper and the info dictionary. The infohash
//! is the SHA-1 of the bencoded info dictionary; fields are declared in
//! bencode key order so re-encoding reproduces the original bytes.

use crate::error::{IndexerError, IndexerResult};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// BitTorrent metainfo file structure (v1)
#[derive(Debug, Clone, Deserialize)]
pub struct Metainfo {
    /// Announce URL for the tracker
    pub announce: Option<String>,

    /// Info dictionary (the part that's hashed for the infohash)
    pub info: Info,
}

/// Info dictionary structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// For multi-file torrents: list of files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileInfo>>,

    /// For single-file torrents: file length in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,

    /// For single-file torrents: MD5 checksum (deprecated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5sum: Option<String>,

    /// Name of the file or directory
    pub name: String,

    /// Piece length in bytes
    #[serde(rename = "piece length")]
    pub piece_length: i64,

    /// Concatenated SHA1 hashes of all pieces
    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,

    /// Private flag (1 = private torrent, disable DHT/PEX)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<i64>,
}

/// File entry in a multi-file torrent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// File length in bytes
    pub length: i64,

    /// Path components
    pub path: Vec<String>,
}

/// Parse a `.torrent` file and compute its infohash (lowercase hex)
pub fn info_hash_from_torrent(bytes: &[u8]) -> IndexerResult<String> {
    let metainfo: Metainfo = serde_bencode::from_bytes(bytes)
        .map_err(|err| IndexerError::InvalidMetainfo(err.to_string()))?;

    let info_bytes = serde_bencode::to_bytes(&metainfo.info)
        .map_err(|err| IndexerError::InvalidMetainfo(err.to_string()))?;

    let mut hasher = Sha1::new();
    hasher.update(&info_bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single-file torrent with the minimal v1 info dictionary:
    //   {length: 12345, name: "test.mkv", piece length: 16384,
    //    pieces: 20 * 'a'}
    const TORRENT: &[u8] = b"d8:announce31:http://tracker.example/announce4:infod6:lengthi12345e\
4:name8:test.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";

    #[test]
    fn test_info_hash_from_torrent() {
        let hash = info_hash_from_torrent(TORRENT).unwrap();
        assert_eq!(hash, "92c3c807e42fc357e1baad9fbed1b05374bdc9e0");
    }

    #[test]
    fn test_parse_exposes_metainfo_fields() {
        let metainfo: Metainfo = serde_bencode::from_bytes(TORRENT).unwrap();
        assert_eq!(metainfo.announce.as_deref(), Some("http://tracker.example/announce"));
        assert_eq!(metainfo.info.name, "test.mkv");
        assert_eq!(metainfo.info.length, Some(12345));
        assert_eq!(metainfo.info.pieces.len(), 20);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(info_hash_from_torrent(b"not a torrent").is_err());
    }
}
