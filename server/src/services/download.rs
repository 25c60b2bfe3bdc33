mod command;

pub use self::command::DownloadCommand;

use crate::error::ApiError;
use crate::AppState;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use joblib::{Job, JobSpec};
use serde::Deserialize;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub args: String,
}

/// `POST /ytdlp`: run yt-dlp through uvx and stream its output as it happens.
///
/// Everything that can fail before the child exists is an ordinary error response.
/// Once the body starts, failures are written into it. If the client hangs up, the body
/// is dropped, which cancels the job and stops the child.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    let config = &state.config;
    info!(url = %req.url, args = %req.args, "download requested");

    let uvx = match state.uvx.as_deref() {
        Some(uvx) if is_executable(uvx) => uvx,
        other => {
            error!(uvx = ?other, "uvx not found or not executable");
            return Err(ApiError::UvxMissing);
        }
    };

    let caller_args = shell_words::split(&req.args).map_err(|err| {
        error!(args = %req.args, error = %err, "could not split yt-dlp arguments");
        ApiError::BadArgs(err)
    })?;

    let refresh_cache = state.refresh.claim().await;
    let command = DownloadCommand::build(config, uvx, &req.url, caller_args, refresh_cache);
    info!(command = %command.display(), "executing");

    let spec = JobSpec::new(
        command.program,
        command.args,
        config.download_dir.to_string_lossy().into_owned(),
    )
    .grace(config.grace_period());
    let job = Job::spawn(spec).map_err(|err| {
        error!(url = %req.url, error = %err, "failed to launch download");
        ApiError::Launch(err)
    })?;
    let job_id = job.id().to_string();
    info!(%job_id, url = %req.url, "streaming download output");

    let body = Body::from_stream(job.into_stream().bytes().map(Ok::<_, Infallible>));
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::HeaderName::from_static("x-job-id"), job_id),
        ],
        body,
    )
        .into_response())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
