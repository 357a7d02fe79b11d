//! Magnet URI parsing

use crate::error::{IndexerError, IndexerResult};
use url::Url;

const BTIH_PREFIX: &str = "urn:btih:";

/// Extract the BitTorrent infohash from a magnet URI.
///
/// The hash is taken from the first `xt=urn:btih:` exact topic and
/// lowercased, so hashes compare and dedupe consistently everywhere.
pub fn info_hash_from_magnet(uri: &str) -> IndexerResult<String> {
    let parsed = Url::parse(uri).map_err(|err| IndexerError::InvalidMagnet(err.to_string()))?;

    if parsed.scheme() != "magnet" {
        return Err(IndexerError::InvalidMagnet(format!(
            "not a magnet uri: {}",
            uri
        )));
    }

    for (key, value) in parsed.query_pairs() {
        if key == "xt" {
            if let Some(hash) = value.strip_prefix(BTIH_PREFIX) {
                return Ok(hash.to_lowercase());
            }
        }
    }

    Err(IndexerError::InvalidMagnet(format!(
        "no btih topic in magnet uri: {}",
        uri
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_from_magnet() {
        let hash = info_hash_from_magnet(
            "magnet:?xt=urn:btih:9B4C1489BFCCD8205D152345F7A8AAD52D9A1F57&dn=archlinux-2022.05.01-x86_64.iso",
        )
        .unwrap();
        assert_eq!(hash, "9b4c1489bfccd8205d152345f7a8aad52d9a1f57");
    }

    #[test]
    fn test_info_hash_from_magnet_with_trackers() {
        let hash = info_hash_from_magnet(
            "magnet:?xt=urn:btih:9b4c1489bfccd8205d152345f7a8aad52d9a1f57&tr=udp%3A%2F%2Ftracker.example%3A6969",
        )
        .unwrap();
        assert_eq!(hash, "9b4c1489bfccd8205d152345f7a8aad52d9a1f57");
    }

    #[test]
    fn test_rejects_non_magnet() {
        assert!(info_hash_from_magnet("https://example.com").is_err());
    }

    #[test]
    fn test_rejects_magnet_without_btih() {
        assert!(info_hash_from_magnet("magnet:?dn=something").is_err());
    }
}
