pub mod config;
pub mod error;
mod interceptors;
pub mod refresh;
pub mod services;

use crate::config::ServerConfig;
use crate::refresh::CacheRefresh;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared, read-mostly state handed to every request.
pub struct AppState {
    pub config: ServerConfig,
    pub uvx: Option<PathBuf>,
    pub refresh: CacheRefresh,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let uvx = config.locate_uvx();
        Self::with_uvx(config, uvx)
    }

    pub fn with_uvx(config: ServerConfig, uvx: Option<PathBuf>) -> Self {
        let refresh = CacheRefresh::new(config.refresh_stamp_file(), config.refresh_interval());
        Self {
            config,
            uvx,
            refresh,
        }
    }
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = interceptors::cors(&state.config);
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/ytdlp", post(services::download::download))
        .route("/downloaded", get(services::files::list))
        .route(
            "/downloaded/{*filename}",
            get(services::files::fetch).delete(services::files::delete),
        )
        .with_state(state)
        .layer(middleware::from_fn(interceptors::log_requests));
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    app
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::process::Command;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// `sh` stands in for uvx: it is handed `yt-dlp -o ...` and runs the `yt-dlp`
    /// script sitting in the working directory, which is the download directory.
    fn app_with_stub(stub: &str) -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("yt-dlp"), stub).unwrap();
        let stamp = dir.path().join("stamp.txt");
        // a fresh stamp keeps --no-cache (which sh would choke on) out of the command
        std::fs::write(&stamp, chrono::Local::now().to_rfc3339()).unwrap();

        let config = ServerConfig {
            download_dir: dir.path().to_path_buf(),
            refresh_stamp_file: Some(stamp),
            grace_period_secs: 1,
            ..ServerConfig::default()
        };
        let state = AppState::with_uvx(config, Some(PathBuf::from("/bin/sh")));
        (dir, build_app(Arc::new(state)))
    }

    fn post_download(url: &str, args: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ytdlp")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "url": url, "args": args }).to_string()))
            .unwrap()
    }

    async fn body_string(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn download_streams_stdout_then_stderr_then_status() {
        let stub = r#"
for a in "$@"; do echo "arg: $a"; done
echo "Installed 1 package in 21ms" >&2
exit 0
"#;
        let (dir, app) = app_with_stub(stub);
        let resp = app
            .oneshot(post_download("https://example.com/v", "-f 'best video'"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        assert!(resp.headers().contains_key("x-job-id"));

        let expected = format!(
            concat!(
                "--- STDOUT ---\n",
                "arg: -o\n",
                "arg: {}/%(title)s.%(ext)s\n",
                "arg: --newline\n",
                "arg: -f\n",
                "arg: best video\n",
                "arg: https://example.com/v\n",
                "--- STDERR ---\n",
                "Installed 1 package in 21ms\n",
                "--- yt-dlp process finished successfully ---\n",
            ),
            dir.path().display()
        );
        assert_eq!(body_string(resp.into_body()).await, expected);
    }

    #[tokio::test]
    async fn child_failure_still_returns_200_with_exit_code() {
        let (_dir, app) = app_with_stub("echo 'ERROR: unsupported URL' >&2\nexit 2\n");
        let resp = app
            .oneshot(post_download("https://example.com/nope", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp.into_body()).await;
        assert!(body.contains("--- STDERR ---\nERROR: unsupported URL\n"));
        assert!(body.ends_with("--- yt-dlp process exited with code 2 ---\n"));
    }

    #[tokio::test]
    async fn unbalanced_quotes_are_a_bad_request() {
        let (_dir, app) = app_with_stub("exit 0\n");
        let resp = app
            .oneshot(post_download("https://example.com/v", "-f \"best"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_string(resp.into_body()).await).unwrap();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Invalid yt-dlp arguments format"));
    }

    #[tokio::test]
    async fn missing_uvx_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            download_dir: dir.path().to_path_buf(),
            refresh_stamp_file: Some(dir.path().join("stamp.txt")),
            ..ServerConfig::default()
        };
        let state = AppState::with_uvx(config, Some(dir.path().join("no-such-uvx")));
        let resp = build_app(Arc::new(state))
            .oneshot(post_download("https://example.com/v", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body_string(resp.into_body()).await).unwrap();
        assert_eq!(body["detail"], "UVX required on server");
    }

    #[tokio::test]
    async fn closing_the_body_early_kills_the_child() {
        let stub = r#"
echo $$ > child.pid
echo "[download] Destination: clip.mp4"
exec sleep 30
"#;
        let (dir, app) = app_with_stub(stub);
        let resp = app
            .oneshot(post_download("https://example.com/v", ""))
            .await
            .unwrap();
        let mut body = resp.into_body();

        // read until the first progress line shows up, then hang up
        let mut seen = String::new();
        while !seen.contains("Destination") {
            let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
                .await
                .expect("output should stream before the child exits")
                .expect("body ended early")
                .unwrap();
            if let Ok(data) = frame.into_data() {
                seen.push_str(&String::from_utf8_lossy(&data));
            }
        }
        let pid = std::fs::read_to_string(dir.path().join("child.pid")).unwrap();
        let pid = pid.trim().to_string();
        drop(body);

        let mut alive = true;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            alive = Command::new("kill")
                .args(["-0", &pid])
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            if !alive {
                break;
            }
        }
        assert!(!alive, "child {pid} survived the disconnect");
    }

    #[tokio::test]
    async fn list_fetch_and_delete_downloads() {
        let (dir, app) = app_with_stub("exit 0\n");
        std::fs::write(dir.path().join("song.m4a"), b"not really audio").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let resp = app
            .clone()
            .oneshot(Request::get("/downloaded").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let listing: Value = serde_json::from_str(&body_string(resp.into_body()).await).unwrap();
        let names: Vec<&str> = listing
            .as_array()
            .unwrap()
            .iter()
            .map(|file| file["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"song.m4a"));
        assert!(!names.contains(&"subdir"));
        let song = listing
            .as_array()
            .unwrap()
            .iter()
            .find(|file| file["name"] == "song.m4a")
            .unwrap();
        assert_eq!(song["size"], 16);
        assert!(song["mtime"].as_str().unwrap().contains('T'));

        let resp = app
            .clone()
            .oneshot(
                Request::get("/downloaded/song.m4a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp.into_body()).await, "not really audio");

        let resp = app
            .clone()
            .oneshot(
                Request::delete("/downloaded/song.m4a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_string(resp.into_body()).await).unwrap();
        assert_eq!(body["message"], "File 'song.m4a' deleted successfully.");
        assert!(!dir.path().join("song.m4a").exists());

        let resp = app
            .oneshot(
                Request::get("/downloaded/song.m4a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_dir, app) = app_with_stub("exit 0\n");
        for method in ["GET", "DELETE"] {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/downloaded/..%2F..%2Fetc%2Fpasswd")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value =
                serde_json::from_str(&body_string(resp.into_body()).await).unwrap();
            assert_eq!(body["detail"], "Invalid filename");
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_dir, app) = app_with_stub("exit 0\n");
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
