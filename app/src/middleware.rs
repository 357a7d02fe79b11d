use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tower_http::cors::CorsLayer;

/// Permissive CORS; Stremio clients call from arbitrary origins
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

/// Request logging with the user-data path segment masked; it carries
/// API keys and must never reach the logs
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = masked_path(request.uri().path());

    let response = next.run(request).await;

    tracing::info!(
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        %method,
        path,
        "request"
    );

    response
}

/// Replace the leading user-data segment with `***` on the routes that
/// carry one
fn masked_path(path: &str) -> String {
    let mut segments = path.splitn(3, '/');
    let _leading = segments.next();
    let (Some(_user_data), Some(rest)) = (segments.next(), segments.next()) else {
        return path.to_string();
    };

    let routed = rest.split('/').next().unwrap_or(rest);
    match routed {
        "configure" | "stream" | "download" | "manifest.json" => format!("/***/{}", rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_path_hides_user_data() {
        assert_eq!(
            masked_path("/%7B%22RDAPIKey%22%3A%22k%22%7D/stream/movie/tt1.json"),
            "/***/stream/movie/tt1.json"
        );
        assert_eq!(
            masked_path("/abc/download/deadbeef/2"),
            "/***/download/deadbeef/2"
        );
        assert_eq!(masked_path("/abc/manifest.json"), "/***/manifest.json");
        assert_eq!(masked_path("/abc/configure"), "/***/configure");
    }

    #[test]
    fn test_masked_path_leaves_plain_routes() {
        assert_eq!(masked_path("/manifest.json"), "/manifest.json");
        assert_eq!(masked_path("/health"), "/health");
        assert_eq!(masked_path("/configure"), "/configure");
    }
}
