//! Layered configuration: defaults, then `config.toml`, then `GAMEREC_*`
//! environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;

/// Directory name under the platform config/data roots.
pub const APP_DIR: &str = "gamerec";

const DEFAULT_CONFIG: &str = r##"# GameRec configuration.
# Every key can also be set through GAMEREC_<KEY>, e.g. GAMEREC_API_BASE_URL.

# Recommendation backend.
api_base_url = "http://127.0.0.1:5000"

# Upper bound for every backend call; expiry counts as a failed request.
request_timeout_secs = 10

# Where gamerec.log is written. Defaults to the platform data directory.
# log_dir = "/tmp/gamerec"

[theme]
# Hex colour overrides, e.g. accent = "#e0524c".
# accent = "#e0524c"
# success = "#4caf50"
# warning = "#e0b341"
# danger = "#e0524c"
# muted = "#777777"
"##;

/// Optional colour overrides for the terminal palette.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeConfig {
    /// Highlight colour.
    pub accent: Option<String>,
    /// Liked / positive colour.
    pub success: Option<String>,
    /// Pending / caution colour.
    pub warning: Option<String>,
    /// Disliked / error colour.
    pub danger: Option<String>,
    /// Secondary text colour.
    pub muted: Option<String>,
}

/// Runtime settings for the client.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base address of the recommendation backend.
    #[serde(default = "default_base_url")]
    pub api_base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Directory for the log file.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Palette overrides.
    #[serde(default)]
    pub theme: ThemeConfig,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            request_timeout_secs: default_timeout_secs(),
            log_dir: None,
            theme: ThemeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file plus the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (which may be missing) plus the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("GAMEREC").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let mut config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration values")?;
        if config.request_timeout_secs == 0 {
            config.request_timeout_secs = default_timeout_secs();
        }
        config.api_base_url = config.api_base_url.trim().to_string();
        Ok(config)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory the log file lives in.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }
}

/// Location of `config.toml` under the user's config directory.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Write the commented default config if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_round_trips_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(path.clone())?;
        assert!(path.exists());

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api_base_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.log_dir.is_none());
        assert!(config.theme.accent.is_none());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r##"
api_base_url = " http://recs.internal:8080/api "
request_timeout_secs = 0
log_dir = "/var/log/gamerec"

[theme]
accent = "#ff8800"
"##,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api_base_url, "http://recs.internal:8080/api");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.log_dir(), PathBuf::from("/var/log/gamerec"));
        assert_eq!(config.theme.accent.as_deref(), Some("#ff8800"));
        Ok(())
    }

    #[test]
    fn existing_file_is_left_alone() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 3\n")?;
        write_default_config(path.clone())?;
        assert_eq!(fs::read_to_string(&path)?, "request_timeout_secs = 3\n");
        Ok(())
    }

    #[test]
    fn missing_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.request_timeout_secs, 10);
        Ok(())
    }
}
