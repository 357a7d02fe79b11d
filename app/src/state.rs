use crate::config::Config;
use addon::{Addon, AddonOptions, DebridService, TorrentSearcher, UserData};
use anyhow::Result;
use debrid::RealDebrid;
use indexer::Prowlarr;
use media::CineMeta;
use shared::error::{AppError, AppResult};
use shared::FingerprintCache;
use std::sync::Arc;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<FingerprintCache>,
    pub addon: Arc<Addon>,
    default_searcher: Option<Arc<Prowlarr>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let cache = Arc::new(FingerprintCache::default());

        let default_searcher = match (&config.prowlarr_url, &config.prowlarr_api_key) {
            (Some(url), Some(api_key)) => {
                tracing::info!("Using default Prowlarr at {}", url);
                Some(Arc::new(Prowlarr::new(url.clone(), api_key.clone())))
            }
            _ => {
                tracing::info!("No default Prowlarr configured; requests must carry one");
                None
            }
        };

        let addon = Arc::new(Addon::new(
            AddonOptions {
                max_results: config.max_results,
                ..AddonOptions::default()
            },
            Arc::new(CineMeta::new()),
            cache.clone(),
        ));

        Ok(Self {
            config,
            cache,
            addon,
            default_searcher,
        })
    }

    /// Decode the user-data path segment, falling back to the
    /// development debrid key when one is configured
    pub fn user_data(&self, segment: &str) -> AppResult<UserData> {
        match UserData::decode(segment) {
            Ok(user_data) => Ok(user_data),
            Err(err) => match &self.config.rd_api_key {
                Some(fallback) => {
                    tracing::debug!("Falling back to configured debrid key: {}", err);
                    Ok(UserData {
                        rd_api_key: fallback.clone(),
                        prowlarr_url: None,
                        prowlarr_api_key: None,
                    })
                }
                None => Err(err),
            },
        }
    }

    /// The Prowlarr client for a request: the user's override when the
    /// user data carries one, otherwise the configured default
    pub fn searcher_for(&self, user_data: &UserData) -> AppResult<Arc<dyn TorrentSearcher>> {
        if let (Some(url), Some(api_key)) = (&user_data.prowlarr_url, &user_data.prowlarr_api_key)
        {
            return Ok(Arc::new(Prowlarr::new(url.clone(), api_key.clone())));
        }

        match &self.default_searcher {
            Some(searcher) => Ok(searcher.clone()),
            None => Err(AppError::BadRequest(
                "no prowlarr instance configured".to_string(),
            )),
        }
    }

    /// The per-request debrid client
    pub fn debrid_for(&self, user_data: &UserData) -> Arc<dyn DebridService> {
        Arc::new(RealDebrid::new(user_data.rd_api_key.clone()))
    }
}
