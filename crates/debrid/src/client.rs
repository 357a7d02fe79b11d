//! Real-Debrid client and the redemption state machine

use crate::error::{DebridError, DebridResult};
use crate::model::{
    AddMagnetResponse, ApiErrorBody, CachedFile, DebridTorrent, UnrestrictResponse,
    STATUS_DOWNLOADED, STATUS_WAITING_FILES_SELECTION,
};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const REAL_DEBRID_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

// Re-selection is attempted at most this many times per redemption
// before reporting the torrent as not ready.
const MAX_SELECT_ATTEMPTS: usize = 2;

/// Position of a file id within the compacted hoster link array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkIndex {
    /// The file is selected; its link sits at this index
    Selected(usize),
    /// The file exists but is not selected; forces a re-selection
    NotSelected,
    /// The torrent does not contain the file at all
    Missing,
}

/// Real-Debrid API client
#[derive(Clone)]
pub struct RealDebrid {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl RealDebrid {
    /// Create a client against the public Real-Debrid API
    pub fn new(api_token: impl Into<String>) -> Self {
        Self::with_base_url(api_token, REAL_DEBRID_BASE_URL)
    }

    /// Create a client against a specific base URL
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build debrid http client");

        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }

    /// Which files of the given torrents the provider already has.
    ///
    /// The availability response is structurally unstable (providers
    /// answer `[]` instead of `{}` for some hashes), so it is parsed
    /// leniently: any per-hash entry that doesn't have the expected
    /// shape counts as a cache miss for that hash only.
    pub async fn get_files(
        &self,
        info_hashes: &[String],
    ) -> DebridResult<HashMap<String, Vec<CachedFile>>> {
        if info_hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let path: Vec<String> = info_hashes
            .iter()
            .map(|hash| hash.to_lowercase())
            .collect();
        let url = format!(
            "{}/torrents/instantAvailability/{}",
            self.base_url,
            path.join("/")
        );

        let response = self.request_checked(self.http_client.get(&url)).await?;
        let body: Value = response.json().await?;

        let mut available = HashMap::new();
        if let Value::Object(entries) = body {
            for (hash, entry) in entries {
                let files = parse_availability_entry(&entry);
                if files.is_empty() {
                    continue;
                }
                available.insert(hash.to_lowercase(), files);
            }
        } else {
            warn!("Unexpected instant availability payload shape");
        }

        Ok(available)
    }

    /// Redeem an `(infohash, file id)` pair into a direct download URL.
    ///
    /// Drives the provider state machine: find or add the torrent,
    /// select files until the wanted file has a hoster link, then
    /// unrestrict that link. `client_ip` accompanies every mutating
    /// call when non-empty; the provider needs it for geo-locked
    /// unrestricts.
    pub async fn get_download_by_info_hash(
        &self,
        info_hash: &str,
        file_id: i64,
        client_ip: &str,
    ) -> DebridResult<String> {
        let info_hash = info_hash.to_lowercase();

        let torrent_id = match self.find_torrent_id(&info_hash).await? {
            Some(id) => id,
            None => {
                debug!("Torrent {} unknown to provider, adding magnet", info_hash);
                let magnet = format!("magnet:?xt=urn:btih:{}", info_hash);
                self.add_magnet(&magnet, client_ip).await?
            }
        };

        let mut select_attempts = 0;
        loop {
            let torrent = self.get_torrent_info(&torrent_id).await?;
            let link_index = link_index(&torrent, file_id);

            let needs_selection = torrent.status == STATUS_WAITING_FILES_SELECTION
                || link_index == LinkIndex::NotSelected;
            if needs_selection {
                if select_attempts == MAX_SELECT_ATTEMPTS {
                    return Err(DebridError::NotReady(info_hash));
                }
                select_attempts += 1;
                self.select_all_files(&torrent_id, client_ip).await?;
                continue;
            }

            if torrent.status != STATUS_DOWNLOADED {
                debug!("Torrent {} status is still {}", info_hash, torrent.status);
                return Err(DebridError::NotReady(info_hash));
            }

            return match link_index {
                LinkIndex::Missing => Err(DebridError::NoFile(info_hash)),
                // re-selection was already forced above
                LinkIndex::NotSelected => Err(DebridError::NoFile(info_hash)),
                LinkIndex::Selected(index) => match torrent.links.get(index) {
                    Some(link) => self.unrestrict(link, client_ip).await,
                    None => Err(DebridError::NotReady(info_hash)),
                },
            };
        }
    }

    async fn find_torrent_id(&self, info_hash: &str) -> DebridResult<Option<String>> {
        let url = format!("{}/torrents", self.base_url);
        let response = self.request_checked(self.http_client.get(&url)).await?;
        let torrents: Vec<DebridTorrent> = response.json().await?;

        Ok(torrents
            .into_iter()
            .find(|torrent| torrent.hash.eq_ignore_ascii_case(info_hash))
            .map(|torrent| torrent.id))
    }

    async fn add_magnet(&self, magnet: &str, client_ip: &str) -> DebridResult<String> {
        let url = format!("{}/torrents/addMagnet", self.base_url);
        let mut form = vec![("magnet", magnet.to_string())];
        push_ip(&mut form, client_ip);

        let response = self
            .request_checked(self.http_client.post(&url).form(&form))
            .await?;
        let added: AddMagnetResponse = response.json().await?;
        Ok(added.id)
    }

    async fn get_torrent_info(&self, torrent_id: &str) -> DebridResult<DebridTorrent> {
        let url = format!("{}/torrents/info/{}", self.base_url, torrent_id);
        let response = self.request_checked(self.http_client.get(&url)).await?;
        Ok(response.json().await?)
    }

    async fn select_all_files(&self, torrent_id: &str, client_ip: &str) -> DebridResult<()> {
        let url = format!("{}/torrents/selectFiles/{}", self.base_url, torrent_id);
        let mut form = vec![("files", "all".to_string())];
        push_ip(&mut form, client_ip);

        self.request_checked(self.http_client.post(&url).form(&form))
            .await?;
        Ok(())
    }

    async fn unrestrict(&self, hoster_link: &str, client_ip: &str) -> DebridResult<String> {
        let url = format!("{}/unrestrict/link", self.base_url);
        let mut form = vec![("link", hoster_link.to_string())];
        push_ip(&mut form, client_ip);

        let response = self
            .request_checked(self.http_client.post(&url).form(&form))
            .await?;
        let unrestricted: UnrestrictResponse = response.json().await?;
        Ok(unrestricted.download)
    }

    /// Send a request and classify non-success statuses as provider
    /// errors with the provider's error code attached
    async fn request_checked(
        &self,
        request: reqwest::RequestBuilder,
    ) -> DebridResult<reqwest::Response> {
        let response = request.bearer_auth(&self.api_token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ApiErrorBody = response.json().await.unwrap_or(ApiErrorBody {
            error: String::new(),
            error_code: 0,
        });

        Err(DebridError::Remote {
            status: status.as_u16(),
            code: body.error_code,
            message: body.error,
        })
    }
}

fn push_ip(form: &mut Vec<(&'static str, String)>, client_ip: &str) {
    if !client_ip.is_empty() {
        form.push(("ip", client_ip.to_string()));
    }
}

/// Walk the torrent's file list in order. The hoster link array is a
/// compaction over files with `selected > 0`; the wanted file's position
/// in that compaction is its link index.
fn link_index(torrent: &DebridTorrent, file_id: i64) -> LinkIndex {
    let mut compacted_index = 0;
    for file in &torrent.files {
        if file.id == file_id {
            return if file.selected > 0 {
                LinkIndex::Selected(compacted_index)
            } else {
                LinkIndex::NotSelected
            };
        }
        if file.selected > 0 {
            compacted_index += 1;
        }
    }
    LinkIndex::Missing
}

/// Parse one per-hash availability entry; anything malformed yields no
/// files
fn parse_availability_entry(entry: &Value) -> Vec<CachedFile> {
    let mut files = Vec::new();

    let Value::Object(hosters) = entry else {
        return files;
    };

    for variants in hosters.values() {
        let Value::Array(variants) = variants else {
            continue;
        };
        for variant in variants {
            let Value::Object(variant) = variant else {
                continue;
            };
            for (file_id, file) in variant {
                let filename = file
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if filename.is_empty() {
                    continue;
                }
                let filesize = file.get("filesize").and_then(Value::as_u64).unwrap_or(0);
                files.push(CachedFile {
                    id: file_id.clone(),
                    filename: filename.to_string(),
                    filesize,
                });
            }
        }
    }

    files
}
