//! Media file selection inside a torrent's file listing.
//!
//! A cached torrent usually carries several files: samples, subtitles,
//! nfo files, and one or more playable videos. For movies the largest
//! video wins. For series episodes the filenames are probed with three
//! season/episode patterns, from most to least specific, and the
//! largest file matched by the first successful pattern wins.

use regex::Regex;

/// Filename extensions considered playable media
pub const MEDIA_EXTENSIONS: &[&str] = &["mkv", "mk3d", "mp4", "m4v", "mov", "avi", "ts"];

/// Lightweight view of one file inside a torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRef<'a> {
    /// Position in the caller's file listing
    pub index: usize,
    /// Filename (possibly with a path prefix)
    pub name: &'a str,
    /// Size in bytes
    pub size: u64,
}

/// Whether the filename carries a playable media extension
pub fn is_media_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, extension)) => {
            let extension = extension.to_lowercase();
            MEDIA_EXTENSIONS.iter().any(|known| *known == extension)
        }
        None => false,
    }
}

/// Pick the movie file: the largest playable file
pub fn best_movie_file<'a>(files: &[FileRef<'a>]) -> Option<FileRef<'a>> {
    files
        .iter()
        .filter(|file| is_media_file(file.name))
        .max_by_key(|file| file.size)
        .copied()
}

/// Pick the episode file for the given season and episode.
///
/// Patterns are tried in order; within one pattern the largest matching
/// playable file wins:
///
/// 1. A combined season+episode token: `S07E08`, `7x08`, `07.08`, and
///    (single-digit seasons, no separator) the bare `708` form.
/// 2. A season token followed later by an episode token: `S07 … E08`.
/// 3. An episode token alone: `E08` or `8`.
pub fn best_episode_file<'a>(
    files: &[FileRef<'a>],
    season: u32,
    episode: u32,
) -> Option<FileRef<'a>> {
    for pattern in episode_patterns(season, episode) {
        let best = files
            .iter()
            .filter(|file| is_media_file(file.name) && pattern.is_match(file.name))
            .max_by_key(|file| file.size)
            .copied();
        if best.is_some() {
            return best;
        }
    }
    None
}

fn episode_patterns(season: u32, episode: u32) -> Vec<Regex> {
    let season_short = season.to_string();
    let season_padded = format!("{:02}", season);
    let episode_short = episode.to_string();
    let episode_padded = format!("{:02}", episode);

    let patterns = [
        format!(
            r"(?i)(\b|_)s?({}|{})[x._-]?e?{}(\b|_)",
            season_short, season_padded, episode_padded
        ),
        format!(
            r"(?i)\bs?{}\b.+\be?{}\b",
            season_padded, episode_padded
        ),
        format!(r"(?i)\be?({}|{})\b", episode_short, episode_padded),
    ];

    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("invalid episode pattern"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs<'a>(names: &[(&'a str, u64)]) -> Vec<FileRef<'a>> {
        names
            .iter()
            .enumerate()
            .map(|(index, (name, size))| FileRef {
                index,
                name,
                size: *size,
            })
            .collect()
    }

    #[test]
    fn test_is_media_file() {
        assert!(is_media_file("episode.mkv"));
        assert!(is_media_file("episode.MP4"));
        assert!(is_media_file("dir/episode.avi"));
        assert!(!is_media_file("episode.nfo"));
        assert!(!is_media_file("episode.srt"));
        assert!(!is_media_file("no-extension"));
    }

    #[test]
    fn test_best_movie_file_picks_largest_media() {
        let files = refs(&[
            ("sample.mkv", 50),
            ("movie.mkv", 5_000),
            ("movie.nfo", 10_000),
        ]);
        let best = best_movie_file(&files).unwrap();
        assert_eq!(best.name, "movie.mkv");
    }

    #[test]
    fn test_best_episode_file_combined_token() {
        let files = refs(&[
            ("Show.S07E08.1080p.mkv", 3_000),
            ("Show.S07E09.1080p.mkv", 3_100),
            ("Show.S07E08.sample.mkv", 50),
        ]);
        let best = best_episode_file(&files, 7, 8).unwrap();
        assert_eq!(best.name, "Show.S07E08.1080p.mkv");
    }

    #[test]
    fn test_best_episode_file_bare_digits() {
        // single-digit season with no separator: "708" means S07E08
        let files = refs(&[("708 - Army Buddy.mkv", 2_000), ("709 - Other.mkv", 2_000)]);
        let best = best_episode_file(&files, 7, 8).unwrap();
        assert_eq!(best.name, "708 - Army Buddy.mkv");
    }

    #[test]
    fn test_best_episode_file_separated_tokens() {
        let files = refs(&[("Show S07 Episode E08 final.mkv", 1_000)]);
        let best = best_episode_file(&files, 7, 8).unwrap();
        assert_eq!(best.index, 0);
    }

    #[test]
    fn test_best_episode_file_episode_only_fallback() {
        let files = refs(&[("Episode 8.mkv", 900), ("Episode 9.mkv", 900)]);
        let best = best_episode_file(&files, 1, 8).unwrap();
        assert_eq!(best.name, "Episode 8.mkv");
    }

    #[test]
    fn test_best_episode_file_x_separator() {
        let files = refs(&[("show.7x08.mkv", 1_200)]);
        assert!(best_episode_file(&files, 7, 8).is_some());
    }

    #[test]
    fn test_best_episode_file_none_for_non_media() {
        let files = refs(&[("S07E08.srt", 10)]);
        assert!(best_episode_file(&files, 7, 8).is_none());
    }
}
