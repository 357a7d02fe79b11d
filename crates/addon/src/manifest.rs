//! Stremio manifest and stream response shapes

use serde::Serialize;
use shared::types::ContentType;

/// Addon manifest served at `/manifest.json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub resources: Vec<ResourceItem>,
    pub types: Vec<ContentType>,
    pub catalogs: Vec<CatalogItem>,
    pub id_prefixes: Vec<String>,
    pub behavior_hints: ManifestBehaviorHints,
}

/// One resource the addon answers for
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceItem {
    pub name: String,
    pub types: Vec<ContentType>,
    pub id_prefixes: Vec<String>,
}

/// Catalog entry; this addon provides none
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestBehaviorHints {
    pub configurable: bool,
    pub configuration_required: bool,
}

/// Body of the stream endpoint response
#[derive(Debug, Clone, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamItem>,
}

/// One playable stream offered to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamItem {
    pub name: String,
    pub title: String,
    pub url: String,
    pub behavior_hints: StreamBehaviorHints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamBehaviorHints {
    pub video_size: u64,
    pub file_name: String,
}
