//! Title information extraction from torrent names.
//!
//! Parses release names to extract:
//! - Year and resolution
//! - Quality tag (source), codec, audio, container
//! - 3D flag
//! - Season/episode information for series
//! - The "clean title": the prefix of the name before the first
//!   metadata token
//!
//! Parsing is an ordered ladder of regex rules applied over the whole
//! name. Within one rule the last match wins; across rules the first
//! rule to set a field wins and later rules never overwrite it. Every
//! rule that matches reports where its last match starts, and the clean
//! title is cut at the smallest such index. The rule order is load
//! bearing: overlapping quality tags (e.g. "Blu-ray Remux" vs
//! "Blu-ray") resolve correctly only because the more specific rule
//! runs first.

use regex::Regex;
use std::sync::OnceLock;

/// Extracted information from a torrent title
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleInfo {
    pub resolution: Option<u32>,
    pub year: Option<i32>,
    pub quality: Option<String>,
    pub codec: Option<String>,
    pub audio: Option<String>,
    pub container: Option<String>,
    pub three_d: bool,
    pub from_season: Option<u32>,
    pub to_season: Option<u32>,
    pub episode: Option<u32>,
    /// Prefix of the original title before the first metadata token
    pub clean_title: String,
}

impl TitleInfo {
    /// Whether the parsed season information covers the given season.
    /// A title with no season information covers everything.
    pub fn covers_season(&self, season: u32) -> bool {
        match self.from_season {
            None => true,
            Some(from) => {
                let to = self.to_season.unwrap_or(from);
                from <= season && season <= to
            }
        }
    }
}

enum RuleKind {
    /// Capture a year
    Year,
    /// Capture a resolution number ("2160p", "720i")
    Resolution,
    /// Force a resolution value on match (the "4k" alias)
    ResolutionConst(u32),
    /// Remux tags; the captured source prefix is folded into the value
    RemuxQuality,
    /// Capture a quality tag, normalised
    QualityCapture,
    /// Set a fixed quality tag on match
    QualityConst(&'static str),
    /// Capture a codec, normalised
    Codec,
    /// Capture an audio tag
    AudioCapture,
    /// Set a fixed audio tag on match
    AudioConst(&'static str),
    /// Capture a container
    Container,
    /// Set the 3D flag
    ThreeD,
    /// Capture season + episode ("S08E06", "S02-E06")
    SeasonEpisode,
    /// Capture a season range ("S01 to S03", "S01-S03")
    SeasonRange,
    /// Capture a single season ("S02", "Season-02")
    Season,
}

struct Rule {
    regex: Regex,
    kind: RuleKind,
}

fn rule(pattern: &str, kind: RuleKind) -> Rule {
    Rule {
        regex: Regex::new(pattern).expect("invalid title rule pattern"),
        kind,
    }
}

static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

fn rules() -> &'static [Rule] {
    RULES.get_or_init(|| {
        vec![
            rule(r"\b((?:19[0-9]|20[0-9])[0-9])\b", RuleKind::Year),
            rule(r"(?i)([0-9]{3,4})[pi]", RuleKind::Resolution),
            rule(r"(?i)\b4k\b", RuleKind::ResolutionConst(2160)),
            // Remux tags must be recognised before the plain source tags
            // they contain.
            rule(
                r"(?i)\b(blu-?ray|bd|br|web|dl)[ .-]?remux\b",
                RuleKind::RemuxQuality,
            ),
            rule(r"(?i)\b(?:hd-?)?cam-?rip\b", RuleKind::QualityConst("camrip")),
            rule(r"(?i)\b(?:hd-?)?cam\b", RuleKind::QualityCapture),
            rule(r"(?i)\bts-?rip\b", RuleKind::QualityCapture),
            rule(
                r"(?i)\b(?:hd-?)?t(?:ele)?s(?:ync)?\b",
                RuleKind::QualityConst("telesync"),
            ),
            rule(r"(?i)\bhd-?rip\b", RuleKind::QualityCapture),
            rule(r"(?i)\bbrrip\b", RuleKind::QualityCapture),
            rule(r"(?i)\bbdrip\b", RuleKind::QualityCapture),
            rule(r"(?i)\bdvdrip\b", RuleKind::QualityCapture),
            rule(r"(?i)\bdvd(?:r[0-9])?\b", RuleKind::QualityConst("dvd")),
            rule(r"(?i)\bdvdscr\b", RuleKind::QualityCapture),
            rule(r"(?i)\b(?:hd-?)?tvrip\b", RuleKind::QualityCapture),
            rule(r"\bTC\b", RuleKind::QualityCapture),
            rule(r"(?i)\bppvrip\b", RuleKind::QualityCapture),
            rule(r"(?i)\br5\b", RuleKind::QualityCapture),
            rule(r"(?i)\bvhsscr\b", RuleKind::QualityCapture),
            rule(r"(?i)\bblu-?ray\b", RuleKind::QualityCapture),
            rule(r"(?i)\bweb-?dl\b", RuleKind::QualityCapture),
            rule(r"(?i)\bweb-?rip\b", RuleKind::QualityCapture),
            rule(r"(?i)\b(divx|xvid)\b", RuleKind::QualityCapture),
            rule(r"(?i)hdtv", RuleKind::QualityCapture),
            rule(
                r"(?i)dvix|mpeg2|divx|xvid|[xh][-. ]?26[45]|avc|hevc",
                RuleKind::Codec,
            ),
            rule(r"MD|MP3|mp3|FLAC|Atmos|DTS(?:-HD)?|TrueHD", RuleKind::AudioCapture),
            rule(r"(?i)dual[- ]audio", RuleKind::AudioCapture),
            rule(r"(?i)AC-?3(?:\.5\.1)?", RuleKind::AudioConst("ac3")),
            rule(r"(?i)DD5[. ]?1", RuleKind::AudioConst("dd5.1")),
            rule(r"(?i)AAC(?:[. ]?2[. ]0)?", RuleKind::AudioConst("aac")),
            rule(r"(?i)\b(mkv|avi|mp4)\b", RuleKind::Container),
            rule(r"(?i)\b3d\b", RuleKind::ThreeD),
            rule(
                r"(?i)\bs(\d{1,2})[ ._x-]?e(\d{1,2})\b",
                RuleKind::SeasonEpisode,
            ),
            rule(
                r"(?i)\bs(\d{1,2})\s*(?:to|-)\s*s(\d{1,2})\b",
                RuleKind::SeasonRange,
            ),
            rule(r"(?i)\bs(?:eason)?[ .-]?(\d{1,2})\b", RuleKind::Season),
        ]
    })
}

/// Parse a torrent title into [`TitleInfo`]. Pure and deterministic.
pub fn parse(title: &str) -> TitleInfo {
    let mut info = TitleInfo::default();
    let mut clean_len = title.len();

    for rule in rules() {
        if let Some(match_start) = apply(rule, title, &mut info) {
            clean_len = clean_len.min(match_start);
        }
    }

    info.clean_title = title[..clean_len].to_string();
    info
}

/// Apply one rule; returns the start index of its last match, if any
fn apply(rule: &Rule, title: &str, info: &mut TitleInfo) -> Option<usize> {
    let last = rule.regex.find_iter(title).last()?;
    let start = last.start();

    match &rule.kind {
        RuleKind::Year => {
            if info.year.is_none() {
                info.year = last.as_str().parse().ok();
            }
        }
        RuleKind::Resolution => {
            if info.resolution.is_none() {
                let caps = rule.regex.captures_iter(title).last()?;
                info.resolution = caps.get(1).and_then(|m| m.as_str().parse().ok());
            }
        }
        RuleKind::ResolutionConst(value) => {
            if info.resolution.is_none() {
                info.resolution = Some(*value);
            }
        }
        RuleKind::RemuxQuality => {
            if info.quality.is_none() {
                let caps = rule.regex.captures_iter(title).last()?;
                let prefix = normalise_tag(caps.get(1)?.as_str());
                let prefix = if prefix == "bluray" { "br" } else { &prefix };
                info.quality = Some(format!("{}remux", prefix));
            }
        }
        RuleKind::QualityCapture => {
            if info.quality.is_none() {
                info.quality = Some(normalise_tag(last.as_str()));
            }
        }
        RuleKind::QualityConst(value) => {
            if info.quality.is_none() {
                info.quality = Some((*value).to_string());
            }
        }
        RuleKind::Codec => {
            if info.codec.is_none() {
                info.codec = Some(normalise_tag(last.as_str()));
            }
        }
        RuleKind::AudioCapture => {
            if info.audio.is_none() {
                info.audio = Some(last.as_str().to_lowercase());
            }
        }
        RuleKind::AudioConst(value) => {
            if info.audio.is_none() {
                info.audio = Some((*value).to_string());
            }
        }
        RuleKind::Container => {
            if info.container.is_none() {
                info.container = Some(last.as_str().to_lowercase());
            }
        }
        RuleKind::ThreeD => {
            info.three_d = true;
        }
        RuleKind::SeasonEpisode => {
            if info.from_season.is_none() {
                let caps = rule.regex.captures_iter(title).last()?;
                info.from_season = caps.get(1).and_then(|m| m.as_str().parse().ok());
                info.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
            }
        }
        RuleKind::SeasonRange => {
            if info.from_season.is_none() {
                let caps = rule.regex.captures_iter(title).last()?;
                info.from_season = caps.get(1).and_then(|m| m.as_str().parse().ok());
                info.to_season = caps.get(2).and_then(|m| m.as_str().parse().ok());
            }
        }
        RuleKind::Season => {
            if info.from_season.is_none() {
                let caps = rule.regex.captures_iter(title).last()?;
                info.from_season = caps.get(1).and_then(|m| m.as_str().parse().ok());
            }
        }
    }

    Some(start)
}

/// Lowercase and strip separator characters from a captured tag
fn normalise_tag(tag: &str) -> String {
    tag.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_and_year() {
        let info = parse(
            "Mad Max Fury Road 2015 2160P DV HDR10Plus Ai Enhanced H265 TrueHD \
             Atmos 7 1 RIFE 4 15 60fps DirtyHip",
        );
        assert_eq!(info.resolution, Some(2160));
        assert_eq!(info.year, Some(2015));
        assert_eq!(info.clean_title, "Mad Max Fury Road ");
    }

    #[test]
    fn test_parse_4k_alias_and_bdremux() {
        let info = parse("Mad Max: Fury Road (2015) 4K UHD BDRemux 2160p Dolby Vision-Rja");
        assert_eq!(info.resolution, Some(2160));
        assert_eq!(info.quality.as_deref(), Some("bdremux"));
    }

    #[test]
    fn test_parse_remux_wins_over_bluray() {
        let info = parse("Cloud Atlas 2012 1080p USA Blu-ray Remux AVC DTS-HD MA 5.1 -KRa");
        assert_eq!(info.quality.as_deref(), Some("brremux"));
        assert_eq!(info.year, Some(2012));
        assert_eq!(info.codec.as_deref(), Some("avc"));
    }

    #[test]
    fn test_parse_season_episode() {
        let info = parse("Summer House S08E06 Start Your Engines 720p AMZN WEB-DL DDP 2.0 H 264-NTb[TGx]");
        assert_eq!(info.from_season, Some(8));
        assert_eq!(info.episode, Some(6));
        assert_eq!(info.resolution, Some(720));
        assert_eq!(info.clean_title, "Summer House ");
    }

    #[test]
    fn test_parse_season_range() {
        let info = parse("Mind Your Language - S01 to S03 - Sitcom - Xvid -Slimoo");
        assert_eq!(info.from_season, Some(1));
        assert_eq!(info.to_season, Some(3));
        assert!(info.covers_season(2));
        assert!(!info.covers_season(4));
    }

    #[test]
    fn test_parse_separated_season_episode() {
        let info = parse("House of Cards S02-E06 (2013) XviD Custom NLsubs NLtoppers");
        assert_eq!(info.from_season, Some(2));
        assert_eq!(info.episode, Some(6));
    }

    #[test]
    fn test_parse_bare_season() {
        let info = parse("The Great House Revival S02 COMPLETE 720p RTE WEBRip x264 GalaxyTV");
        assert_eq!(info.from_season, Some(2));
        assert_eq!(info.episode, None);
    }

    #[test]
    fn test_parse_dotted_title_with_remux() {
        let info = parse("House.S02.1080p.BluRay.REMUX.AVC.DTS.5.1-NOGRP");
        assert_eq!(info.from_season, Some(2));
        assert_eq!(info.quality.as_deref(), Some("brremux"));
        assert_eq!(info.resolution, Some(1080));
    }

    #[test]
    fn test_parse_season_word_form() {
        let info = parse("House.Season-02.DvDrip.Xvid.Aquintesce");
        assert_eq!(info.from_season, Some(2));
        assert_eq!(info.quality.as_deref(), Some("dvdrip"));
    }

    #[test]
    fn test_parse_is_pure_and_clean_title_is_prefix() {
        let title = "Summer House S08E06 Start Your Engines 720p";
        let first = parse(title);
        let second = parse(title);
        assert_eq!(first, second);
        assert!(title.starts_with(&first.clean_title));
    }

    #[test]
    fn test_parse_no_metadata_keeps_full_title() {
        let info = parse("An Unremarkable Name");
        assert_eq!(info.clean_title, "An Unremarkable Name");
        assert_eq!(info.resolution, None);
        assert_eq!(info.quality, None);
    }

    #[test]
    fn test_parse_3d_flag() {
        let info = parse("Avatar 2009 3D 1080p BluRay Half-SBS");
        assert!(info.three_d);
        assert_eq!(info.quality.as_deref(), Some("bluray"));
    }

    #[test]
    fn test_parse_telesync() {
        let info = parse("New Release 2024 HDTS x264");
        assert_eq!(info.quality.as_deref(), Some("telesync"));
    }
}
