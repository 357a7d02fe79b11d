use crate::state::AppState;
use addon::{StreamsRequest, StreamsResponse};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::header::{CACHE_CONTROL, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::{middleware, Router};
use shared::error::{AppError, AppResult};
use shared::types::{ContentType, StreamId};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

const STREAMS_CACHE_CONTROL: &str =
    "max-age=1800, public, stale-while-revalidate=604800, stale-if-error=604800";
const DOWNLOAD_CACHE_CONTROL: &str = "max-age=86400, public";

const CONFIGURE_PAGE: &str = include_str!("../assets/configure.html");

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/health", get(health_check))
        .route("/manifest.json", get(get_manifest))
        .route("/:user_data/manifest.json", get(get_manifest_configured))
        .route("/:user_data/stream/:content_type/:id", get(get_streams))
        .route(
            "/:user_data/download/:info_hash/:file_id",
            get(download).head(download),
        )
        .route("/configure", get(configure))
        .route("/:user_data/configure", get(configure))
        .layer(middleware::from_fn(
            crate::middleware::request_logging_middleware,
        ))
        .layer(crate::middleware::create_cors_layer())
        .with_state(app_state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn get_manifest(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.addon.manifest())
}

/// Manifest behind a user-data segment: when the segment decodes, the
/// addon no longer demands configuration
async fn get_manifest_configured(
    State(state): State<Arc<AppState>>,
    Path(user_data): Path<String>,
) -> impl IntoResponse {
    let mut manifest = state.addon.manifest();
    if state.user_data(&user_data).is_ok() {
        manifest.behavior_hints.configuration_required = false;
    }
    Json(manifest)
}

async fn configure() -> impl IntoResponse {
    Html(CONFIGURE_PAGE)
}

async fn get_streams(
    State(state): State<Arc<AppState>>,
    Path((user_data, content_type, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> AppResult<Response> {
    let decoded = state.user_data(&user_data)?;
    let content_type =
        ContentType::from_str(&content_type).map_err(AppError::BadRequest)?;
    let stream_id = StreamId::parse(content_type, &id).map_err(AppError::BadRequest)?;

    let request = StreamsRequest {
        stream_id,
        base_url: base_url(&headers, &user_data),
        client_ip: client_ip(&headers, peer),
        searcher: state.searcher_for(&decoded)?,
        debrid: state.debrid_for(&decoded),
    };

    let streams = state.addon.streams(request).await;

    Ok((
        [(CACHE_CONTROL, STREAMS_CACHE_CONTROL)],
        Json(StreamsResponse { streams }),
    )
        .into_response())
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path((user_data, info_hash, file_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> AppResult<Response> {
    let decoded = state.user_data(&user_data)?;
    let file_id: i64 = file_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid file id: {}", file_id)))?;

    let download_url = state
        .addon
        .resolve_download(
            state.debrid_for(&decoded),
            &decoded.rd_api_key,
            &info_hash,
            file_id,
            &client_ip(&headers, peer),
        )
        .await?;

    Ok((
        StatusCode::FOUND,
        [
            (LOCATION, download_url.as_str()),
            (CACHE_CONTROL, DOWNLOAD_CACHE_CONTROL),
        ],
    )
        .into_response())
}

/// `scheme://host/{userData}` prefix used to build download URLs
fn base_url(headers: &HeaderMap, user_data: &str) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("host")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}/{}", proto, host, urlencoding::encode(user_data))
}

/// Prefer the proxy-reported client address over the peer address
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.8.7.6, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        assert_eq!(client_ip(&headers, peer), "9.8.7.6");
        assert_eq!(client_ip(&HeaderMap::new(), peer), "127.0.0.1");
    }

    #[test]
    fn test_base_url_re_encodes_user_data() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "relay.example".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());

        let url = base_url(&headers, r#"{"RDAPIKey":"k"}"#);
        assert!(url.starts_with("https://relay.example/"));
        assert!(!url.contains('{'));
    }
}
