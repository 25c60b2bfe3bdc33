use crate::error::ApiError;
use crate::AppState;

use axum::{
    extract::{Path as AxPath, Request, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info, warn};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DownloadedFile {
    pub name: String,
    /// Local time, ISO-8601 without an offset.
    pub mtime: String,
    pub size: u64,
}

/// `GET /downloaded`: every regular file in the download directory, newest first.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DownloadedFile>>, ApiError> {
    let dir = &state.config.download_dir;
    let mut entries = fs::read_dir(dir).await.map_err(|err| {
        error!(dir = %dir.display(), error = %err, "could not list download directory");
        err
    })?;

    let mut files: Vec<(SystemTime, DownloadedFile)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(err) => {
                error!(file = ?entry.file_name(), error = %err, "could not stat file");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((
            modified,
            DownloadedFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                mtime: iso_local(modified),
                size: meta.len(),
            },
        ));
    }
    files.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(Json(files.into_iter().map(|(_, file)| file).collect()))
}

/// `GET /downloaded/{*filename}`
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    AxPath(filename): AxPath<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = existing_file(&state.config.download_dir, &filename).await?;
    info!(path = %path.display(), "serving file");
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => Ok(response.into_response()),
        Err(never) => match never {},
    }
}

/// `DELETE /downloaded/{*filename}`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    AxPath(filename): AxPath<String>,
) -> Result<Json<Value>, ApiError> {
    let path = existing_file(&state.config.download_dir, &filename).await?;
    fs::remove_file(&path).await.map_err(|err| {
        error!(path = %path.display(), error = %err, "could not delete file");
        err
    })?;
    info!(path = %path.display(), "deleted file");
    Ok(Json(json!({
        "message": format!("File '{}' deleted successfully.", filename)
    })))
}

async fn existing_file(root: &Path, filename: &str) -> Result<PathBuf, ApiError> {
    let path = resolve(root, filename).ok_or_else(|| {
        warn!(filename, "attempted directory traversal");
        ApiError::InvalidFilename
    })?;
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => {
            warn!(path = %path.display(), "file not found");
            Err(ApiError::NotFound)
        }
    }
}

/// Join `filename` onto `root` lexically, refusing anything that would leave `root`.
pub fn resolve(root: &Path, filename: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(filename).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    let mut path = root.to_path_buf();
    path.extend(parts);
    Some(path)
}

fn iso_local(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
