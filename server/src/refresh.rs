//! Once per interval, uvx is told to skip its cache so the newest yt-dlp is fetched.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use tokio::{fs, sync::Mutex};
use tracing::{error, info};

pub const NO_CACHE_FLAG: &str = "--no-cache";

pub struct CacheRefresh {
    stamp_file: PathBuf,
    interval: Duration,
    // serializes check-and-record so two concurrent requests don't both refresh
    lock: Mutex<()>,
}

impl CacheRefresh {
    pub fn new(stamp_file: PathBuf, interval: Duration) -> Self {
        Self {
            stamp_file,
            interval,
            lock: Mutex::new(()),
        }
    }

    /// Whether the next run should bypass the uvx cache. A due refresh is recorded
    /// immediately, so only one caller per interval gets `true`.
    pub async fn claim(&self) -> bool {
        let _guard = self.lock.lock().await;
        if !self.should_refresh(Local::now()).await {
            return false;
        }
        self.record(Local::now()).await;
        true
    }

    /// Missing, empty, corrupt or stale stamps all mean "refresh".
    pub async fn should_refresh(&self, now: DateTime<Local>) -> bool {
        let raw = match fs::read_to_string(&self.stamp_file).await {
            Ok(raw) => raw,
            Err(_) => {
                info!(file = %self.stamp_file.display(), "no refresh timestamp, refreshing cache");
                return true;
            }
        };
        let raw = raw.trim();
        if raw.is_empty() {
            info!("refresh timestamp is empty, refreshing cache");
            return true;
        }
        let last = match DateTime::parse_from_rfc3339(raw) {
            Ok(last) => last.with_timezone(&Local),
            Err(err) => {
                error!(error = %err, "could not parse refresh timestamp, refreshing cache");
                return true;
            }
        };
        let elapsed = now.signed_duration_since(last);
        match elapsed.to_std() {
            Ok(elapsed) if elapsed > self.interval => {
                info!(?elapsed, "refresh interval passed, refreshing cache");
                true
            }
            _ => false,
        }
    }

    pub async fn record(&self, now: DateTime<Local>) {
        match fs::write(&self.stamp_file, now.to_rfc3339()).await {
            Ok(()) => info!(file = %self.stamp_file.display(), "cache refresh timestamp updated"),
            Err(err) => error!(error = %err, "failed to record refresh timestamp"),
        }
    }
}
