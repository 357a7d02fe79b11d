use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Switches logging to json and quiets request noise
    #[serde(default)]
    pub production: bool,

    /// Default Prowlarr instance; users may override per request
    #[serde(default)]
    pub prowlarr_url: Option<String>,

    #[serde(default)]
    pub prowlarr_api_key: Option<String>,

    /// Development fallback debrid key, used when a request carries no
    /// valid user data
    #[serde(default)]
    pub rd_api_key: Option<String>,

    /// Streams returned per request
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_max_results() -> usize {
    addon::DEFAULT_MAX_RESULTS
}

impl Config {
    /// Load configuration from an optional `config.toml` plus the
    /// environment (`PROWLARR_URL`, `PROWLARR_API_KEY`, `PRODUCTION`,
    /// `RD_API_KEY`, `PORT`, ...)
    pub fn load() -> Result<Self> {
        let config = ConfigBuilder::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
