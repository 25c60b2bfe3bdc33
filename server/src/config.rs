//! Server settings, loaded once at startup from a TOML file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable that overrides every other way of finding `uvx`.
pub const UVX_PATH_ENV: &str = "UVX_EXPECTED_PATH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("download_dir must not be empty")]
    MissingDownloadDir,
    #[error("failed to create download dir {}: {source}", path.display())]
    CreateDownloadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub download_dir: PathBuf,
    pub bind: String,
    pub uvx_path: Option<PathBuf>,
    /// yt-dlp output template, relative to `download_dir`.
    pub output_template: String,
    /// Flags passed to yt-dlp on every run, before the caller's own.
    pub fixed_flags: Vec<String>,
    pub grace_period_secs: u64,
    pub refresh_interval_hours: u64,
    pub refresh_stamp_file: Option<PathBuf>,
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::new(),
            bind: "127.0.0.1:8000".into(),
            uvx_path: None,
            output_template: "%(title)s.%(ext)s".into(),
            fixed_flags: vec!["--newline".into()],
            grace_period_secs: 5,
            refresh_interval_hours: 24,
            refresh_stamp_file: None,
            cors_allow_any: true,
        }
    }
}

impl ServerConfig {
    /// Read and validate `path`. Relative paths inside the file resolve against the
    /// file's own directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if config.download_dir.is_relative() {
            config.download_dir = base.join(&config.download_dir);
        }
        let stamp = config
            .refresh_stamp_file
            .take()
            .unwrap_or_else(|| PathBuf::from("last_ytdlprefresh.txt"));
        config.refresh_stamp_file = Some(if stamp.is_relative() {
            base.join(stamp)
        } else {
            stamp
        });

        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDownloadDir);
        }
        Ok(())
    }

    /// Create the download directory if it does not exist yet.
    pub fn ensure_download_dir(&self) -> Result<(), ConfigError> {
        if self.download_dir.is_dir() {
            info!(dir = %self.download_dir.display(), "using download directory");
            return Ok(());
        }
        std::fs::create_dir_all(&self.download_dir).map_err(|source| {
            ConfigError::CreateDownloadDir {
                path: self.download_dir.clone(),
                source,
            }
        })?;
        info!(dir = %self.download_dir.display(), "created download directory");
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours * 60 * 60)
    }

    pub fn refresh_stamp_file(&self) -> PathBuf {
        self.refresh_stamp_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("last_ytdlprefresh.txt"))
    }

    /// Where `uvx` should live: the env override, the configured path, then the usual
    /// install locations that exist.
    pub fn locate_uvx(&self) -> Option<PathBuf> {
        let from_env = std::env::var_os(UVX_PATH_ENV).map(PathBuf::from);
        locate_uvx_from(from_env, self.uvx_path.clone(), home::home_dir())
    }
}

fn locate_uvx_from(
    from_env: Option<PathBuf>,
    configured: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    // an explicit choice is returned even if missing, so the request fails loudly
    if let Some(path) = from_env.or(configured) {
        return Some(path);
    }
    let home = home?;
    [".cargo/bin/uvx", ".local/bin/uvx"]
        .iter()
        .map(|rel| home.join(rel))
        .find(|candidate| candidate.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let config = ServerConfig::from_toml("download_dir = \"/srv/media\"\n").unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.bind, "127.0.0.1:8000");
        assert_eq!(config.output_template, "%(title)s.%(ext)s");
        assert_eq!(config.fixed_flags, vec!["--newline".to_string()]);
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.refresh_interval(), Duration::from_secs(86_400));
        assert!(config.cors_allow_any);
    }

    #[test]
    fn load_resolves_relative_paths_next_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "download_dir = \"media\"\ngrace_period_secs = 2\n").unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.download_dir, dir.path().join("media"));
        assert_eq!(
            config.refresh_stamp_file(),
            dir.path().join("last_ytdlprefresh.txt")
        );
        assert_eq!(config.grace_period(), Duration::from_secs(2));

        config.ensure_download_dir().unwrap();
        assert!(dir.path().join("media").is_dir());
    }

    #[test]
    fn missing_file_and_bad_toml_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ServerConfig::load(&missing),
            Err(ConfigError::NotFound(_))
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "download_dir = [").unwrap();
        assert!(matches!(
            ServerConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let empty = dir.path().join("empty.toml");
        std::fs::write(&empty, "bind = \"0.0.0.0:9000\"\n").unwrap();
        assert!(matches!(
            ServerConfig::load(&empty),
            Err(ConfigError::MissingDownloadDir)
        ));
    }

    #[test]
    fn uvx_lookup_order() {
        let home = tempfile::tempdir().unwrap();
        let explicit = PathBuf::from("/opt/uv/uvx");

        assert_eq!(
            locate_uvx_from(Some(explicit.clone()), Some("/other".into()), None),
            Some(explicit.clone())
        );
        assert_eq!(
            locate_uvx_from(None, Some(explicit.clone()), None),
            Some(explicit)
        );
        assert_eq!(
            locate_uvx_from(None, None, Some(home.path().to_path_buf())),
            None
        );

        let local_bin = home.path().join(".local/bin");
        std::fs::create_dir_all(&local_bin).unwrap();
        std::fs::write(local_bin.join("uvx"), "").unwrap();
        assert_eq!(
            locate_uvx_from(None, None, Some(home.path().to_path_buf())),
            Some(local_bin.join("uvx"))
        );
    }
}
