//! Torrent exclusion policy.
//!
//! A torrent survives filtering only when every check holds:
//!
//! - its quality tag is neither a remux nor a low-grade capture
//! - it is not 3D
//! - its IMDb id, when known, matches the requested content
//! - its release year, when parsed, falls inside the metadata window
//! - for series, the parsed season range covers the requested season
//!   and the parsed episode (if any) equals the requested one
//! - when the indexer supplied no IMDb id, the clean title must sit
//!   close enough to the canonical name under a weighted edit distance

use media::{MetaInfo, TitleInfo};
use shared::types::{ContentType, StreamId};

/// Remux releases; debrid hosters regularly refuse to stream them
const EXCLUDED_REMUX: &[&str] = &["bdremux", "brremux", "webremux", "dlremux"];

/// Low-grade theatre captures
const EXCLUDED_CAPTURES: &[&str] = &["telesync", "cam", "camrip", "hdcam", "tsrip"];

/// Maximum accepted weighted distance between canonical name and title
const SIMILARITY_THRESHOLD: u32 = 5;

const INSERT_COST: u32 = 2;
const DELETE_COST: u32 = 3;
const REPLACE_COST: u32 = 3;

/// Apply the full exclusion policy
pub fn should_keep(
    meta: &MetaInfo,
    stream_id: &StreamId,
    title_info: &TitleInfo,
    torrent_imdb_id: u64,
) -> bool {
    if let Some(quality) = &title_info.quality {
        let quality = quality.as_str();
        if EXCLUDED_REMUX.contains(&quality) || EXCLUDED_CAPTURES.contains(&quality) {
            return false;
        }
    }

    if title_info.three_d {
        return false;
    }

    // 0 means the indexer doesn't know the IMDb id
    if torrent_imdb_id != 0 && torrent_imdb_id != meta.imdb_numeric {
        return false;
    }

    if let Some(year) = title_info.year {
        if year < meta.from_year || year > meta.to_year {
            return false;
        }
    }

    if stream_id.content_type == ContentType::Series {
        if !title_info.covers_season(stream_id.season) {
            return false;
        }
        if let Some(episode) = title_info.episode {
            if episode != stream_id.episode {
                return false;
            }
        }
    }

    if torrent_imdb_id == 0
        && title_similarity(&meta.name, &title_info.clean_title) >= SIMILARITY_THRESHOLD
    {
        return false;
    }

    true
}

/// Weighted edit distance between the canonical name and a clean title,
/// case-insensitive over their alphanumeric content
pub fn title_similarity(name: &str, clean_title: &str) -> u32 {
    weighted_levenshtein(&normalise(name), &normalise(clean_title))
}

fn normalise(value: &str) -> String {
    let kept: String = value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance with insert 2, delete 3, replace 3
fn weighted_levenshtein(from: &str, to: &str) -> u32 {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();

    let mut previous: Vec<u32> = (0..=to.len() as u32).map(|j| j * INSERT_COST).collect();
    let mut current = vec![0u32; to.len() + 1];

    for (i, from_char) in from.iter().enumerate() {
        current[0] = (i as u32 + 1) * DELETE_COST;
        for (j, to_char) in to.iter().enumerate() {
            let replace = previous[j] + if from_char == to_char { 0 } else { REPLACE_COST };
            let delete = previous[j + 1] + DELETE_COST;
            let insert = current[j] + INSERT_COST;
            current[j + 1] = replace.min(delete).min(insert);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[to.len()]
}
