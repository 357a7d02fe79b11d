//! Content type and stream id primitives.
//!
//! Stremio addresses content with IMDb-based ids: a bare `tt…` id for
//! movies, and a colon-separated `tt…:season:episode` triple for series
//! episodes. The triple arrives URL-encoded (`tt…%3A2%3A6`) and some
//! clients ship the encoded form through to the path, so the splitter
//! accepts both the encoded and the decoded separator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of content a stream request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "series" => Ok(Self::Series),
            other => Err(format!("unsupported content type: {}", other)),
        }
    }
}

/// Parsed stream identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamId {
    pub content_type: ContentType,
    pub imdb_id: String,
    pub season: u32,
    pub episode: u32,
}

impl StreamId {
    /// Parse a raw id path segment for the given content type.
    ///
    /// Movies carry a bare IMDb id. Series carry `imdb:season:episode`
    /// with the separator possibly still percent-encoded as `%3A`.
    pub fn parse(content_type: ContentType, raw: &str) -> Result<Self, String> {
        let raw = raw.trim_end_matches(".json");

        match content_type {
            ContentType::Movie => Ok(Self {
                content_type,
                imdb_id: raw.to_string(),
                season: 0,
                episode: 0,
            }),
            ContentType::Series => {
                let tokens: Vec<&str> = if raw.contains("%3A") {
                    raw.split("%3A").collect()
                } else {
                    raw.split(':').collect()
                };

                if tokens.len() != 3 {
                    return Err(format!("invalid series stream id: {}", raw));
                }

                let season = tokens[1]
                    .parse::<u32>()
                    .map_err(|_| format!("invalid season in stream id: {}", raw))?;
                let episode = tokens[2]
                    .parse::<u32>()
                    .map_err(|_| format!("invalid episode in stream id: {}", raw))?;

                Ok(Self {
                    content_type,
                    imdb_id: tokens[0].to_string(),
                    season,
                    episode,
                })
            }
        }
    }
}
