//! User configuration carried in the URL path.
//!
//! Stremio has no per-user server state; the addon's configuration
//! (debrid API key, optional Prowlarr override) travels URL-encoded as
//! the first path segment of every request. A missing or unparsable
//! segment is a client error.

use serde::Deserialize;
use shared::error::AppError;

/// Per-user configuration decoded from the path segment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserData {
    /// Real-Debrid API key
    #[serde(rename = "RDAPIKey")]
    pub rd_api_key: String,

    /// Optional Prowlarr instance overriding the server default
    #[serde(rename = "ProwlarrURL", default)]
    pub prowlarr_url: Option<String>,

    #[serde(rename = "ProwlarrAPIKey", default)]
    pub prowlarr_api_key: Option<String>,
}

impl UserData {
    /// Decode the URL-encoded JSON path segment
    pub fn decode(segment: &str) -> Result<Self, AppError> {
        let decoded = urlencoding::decode(segment)
            .map_err(|err| AppError::BadRequest(format!("invalid user data encoding: {}", err)))?;

        let user_data: UserData = serde_json::from_str(&decoded)
            .map_err(|err| AppError::BadRequest(format!("invalid user data: {}", err)))?;

        if user_data.rd_api_key.is_empty() {
            return Err(AppError::BadRequest("missing debrid api key".to_string()));
        }

        Ok(user_data)
    }
}
