//! Priority orderings for the two reorder stages.
//!
//! Both functions answer "should `a` be emitted before `b`". The first
//! ordering runs before infohash enrichment and pushes the candidates
//! most worth enriching to the front; the second runs after file
//! location and decides the final presentation order.

use crate::streams::StreamRecord;

/// Pre-enrichment ordering: IMDb-confirmed torrents first, then higher
/// resolution, then hits whose magnet/infohash is already known, then
/// seeders
pub fn prefer_confirmed_then_quality(a: &StreamRecord, b: &StreamRecord) -> bool {
    let a_matched = imdb_matched(a);
    let b_matched = imdb_matched(b);
    if a_matched != b_matched {
        return a_matched;
    }

    let a_resolution = resolution(a);
    let b_resolution = resolution(b);
    if a_resolution != b_resolution {
        return a_resolution > b_resolution;
    }

    let a_fingerprint = has_fingerprint(a);
    let b_fingerprint = has_fingerprint(b);
    if a_fingerprint != b_fingerprint {
        return a_fingerprint;
    }

    seeders(a) > seeders(b)
}

/// Final ordering: higher resolution first, larger located file second
pub fn higher_resolution_then_larger_file(a: &StreamRecord, b: &StreamRecord) -> bool {
    let a_resolution = resolution(a);
    let b_resolution = resolution(b);
    if a_resolution != b_resolution {
        return a_resolution > b_resolution;
    }

    file_size(a) > file_size(b)
}

fn imdb_matched(record: &StreamRecord) -> bool {
    let torrent_id = record
        .torrent
        .as_ref()
        .map(|torrent| torrent.imdb_id)
        .unwrap_or(0);
    let meta_id = record
        .meta
        .as_ref()
        .map(|meta| meta.imdb_numeric)
        .unwrap_or(0);
    torrent_id != 0 && torrent_id == meta_id
}

fn resolution(record: &StreamRecord) -> u32 {
    record
        .title_info
        .as_ref()
        .and_then(|info| info.resolution)
        .unwrap_or(0)
}

fn has_fingerprint(record: &StreamRecord) -> bool {
    record
        .torrent
        .as_ref()
        .map(|torrent| torrent.has_fingerprint())
        .unwrap_or(false)
}

fn seeders(record: &StreamRecord) -> u32 {
    record
        .torrent
        .as_ref()
        .map(|torrent| torrent.seeders)
        .unwrap_or(0)
}

fn file_size(record: &StreamRecord) -> u64 {
    record
        .media_file
        .as_ref()
        .map(|file| file.filesize)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::test_support::record_with;

    #[test]
    fn test_imdb_match_beats_resolution() {
        let matched = record_with(|r| {
            r.torrent.as_mut().unwrap().imdb_id = 1392190;
            r.title_info.as_mut().unwrap().resolution = Some(720);
        });
        let unmatched = record_with(|r| {
            r.torrent.as_mut().unwrap().imdb_id = 0;
            r.title_info.as_mut().unwrap().resolution = Some(2160);
        });

        assert!(prefer_confirmed_then_quality(&matched, &unmatched));
        assert!(!prefer_confirmed_then_quality(&unmatched, &matched));
    }

    #[test]
    fn test_resolution_beats_seeders() {
        let sharp = record_with(|r| {
            r.title_info.as_mut().unwrap().resolution = Some(1080);
            r.torrent.as_mut().unwrap().seeders = 1;
        });
        let popular = record_with(|r| {
            r.title_info.as_mut().unwrap().resolution = Some(720);
            r.torrent.as_mut().unwrap().seeders = 500;
        });

        assert!(prefer_confirmed_then_quality(&sharp, &popular));
    }

    #[test]
    fn test_known_fingerprint_beats_seeders() {
        let known = record_with(|r| {
            r.torrent.as_mut().unwrap().info_hash = Some("abc".into());
            r.torrent.as_mut().unwrap().seeders = 1;
        });
        let unknown = record_with(|r| {
            r.torrent.as_mut().unwrap().seeders = 500;
        });

        assert!(prefer_confirmed_then_quality(&known, &unknown));
    }

    #[test]
    fn test_final_order_resolution_then_size() {
        let small_sharp = record_with(|r| {
            r.title_info.as_mut().unwrap().resolution = Some(2160);
            r.media_file.as_mut().unwrap().filesize = 1;
        });
        let large_soft = record_with(|r| {
            r.title_info.as_mut().unwrap().resolution = Some(1080);
            r.media_file.as_mut().unwrap().filesize = 50_000;
        });
        let large_sharp = record_with(|r| {
            r.title_info.as_mut().unwrap().resolution = Some(2160);
            r.media_file.as_mut().unwrap().filesize = 50_000;
        });

        assert!(higher_resolution_then_larger_file(&small_sharp, &large_soft));
        assert!(higher_resolution_then_larger_file(&large_sharp, &small_sharp));
    }
}
