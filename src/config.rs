//! Application configuration loaded from `~/.config/poseflow/config.toml`.
//!
//! Every section is optional; missing keys take their defaults. Secrets and
//! deployment knobs can be overridden from the environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineConfig;
use crate::pose::MoveNetConfig;
use crate::storage::S3Config;
use crate::video::FfmpegConfig;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Largest accepted upload, in megabytes
    pub max_upload_mb: u64,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            max_upload_mb: 500,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

/// Object storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(flatten)]
    pub s3: S3Config,
    /// Lifetime of signed download and upload URLs
    pub url_expiry_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            s3: S3Config::default(),
            url_expiry_secs: 3600,
        }
    }
}

/// ffmpeg locations and accepted input durations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    #[serde(flatten)]
    pub ffmpeg: FfmpegConfig,
    pub min_duration_sec: f64,
    pub max_duration_sec: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: FfmpegConfig::default(),
            min_duration_sec: 3.0,
            max_duration_sec: 420.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TempConfig {
    /// Scratch directory; `<system temp>/pose-est` when unset
    pub base_dir: Option<PathBuf>,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: MoveNetConfig,
    pub storage: StorageConfig,
    pub video: VideoConfig,
    pub temp: TempConfig,
}

impl AppConfig {
    /// Load from `path`, or from the default location if `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    /// Environment overrides are applied and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Apply `POSEFLOW_*` and `R2_*` overrides looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get("POSEFLOW_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = get("POSEFLOW_MODEL_PATH") {
            self.model.model_path = PathBuf::from(path);
        }
        if let Some(endpoint) = get("R2_ENDPOINT_URL") {
            self.storage.s3.endpoint_url = endpoint;
        }
        if let Some(key_id) = get("R2_ACCESS_KEY_ID") {
            self.storage.s3.access_key_id = key_id;
        }
        if let Some(secret) = get("R2_SECRET_ACCESS_KEY") {
            self.storage.s3.secret_access_key = secret;
        }
        if let Some(bucket) = get("R2_BUCKET_NAME") {
            self.storage.s3.bucket = bucket;
        }
    }

    /// Reject settings that would only fail later at request time
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid server.bind address: {}", self.server.bind))?;

        if self.server.max_upload_mb == 0 {
            bail!("server.max_upload_mb must be positive");
        }

        self.model.validate().context("invalid [model] section")?;

        let video = &self.video;
        if video.min_duration_sec < 0.0 || video.min_duration_sec >= video.max_duration_sec {
            bail!(
                "video.min_duration_sec ({}) must be non-negative and below video.max_duration_sec ({})",
                video.min_duration_sec,
                video.max_duration_sec
            );
        }

        let endpoint = &self.storage.s3.endpoint_url;
        if !endpoint.is_empty() {
            url::Url::parse(endpoint)
                .with_context(|| format!("invalid storage.endpoint_url: {endpoint}"))?;
        }

        if self.storage.url_expiry_secs == 0 {
            bail!("storage.url_expiry_secs must be positive");
        }

        Ok(())
    }

    /// Limits handed to the process-video use case
    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            min_duration_sec: self.video.min_duration_sec,
            max_duration_sec: self.video.max_duration_sec,
            url_expiry_secs: self.storage.url_expiry_secs,
        }
    }
}

/// Return the path to the default config file.
#[must_use]
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("poseflow")
        .join("config.toml")
}
