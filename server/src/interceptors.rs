use crate::config::ServerConfig;

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Axum middleware: one structured log line per request.
///
/// For streaming downloads this fires when the headers go out, not when the body ends.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let start = Instant::now();

    let resp = next.run(req).await;

    info!(
        http.method = %method,
        http.path = %path,
        http.status = resp.status().as_u16(),
        http.duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    resp
}

/// The browser UI is served from elsewhere, so by default any origin may call the API.
pub fn cors(config: &ServerConfig) -> Option<CorsLayer> {
    config.cors_allow_any.then(|| {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    })
}
