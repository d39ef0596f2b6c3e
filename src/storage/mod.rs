//! Object storage and scratch-file management
//!
//! - [`StorageService`] - upload, download and signed URLs
//! - [`S3Storage`] - any S3-compatible bucket (AWS, Cloudflare R2, `MinIO`)
//! - [`LocalStorage`] - a directory on disk, for the CLI and tests
//! - [`TempFileManager`] - tracked scratch paths removed on cleanup or drop

pub mod local;
pub mod s3;
pub mod temp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

pub use local::LocalStorage;
pub use s3::{S3Config, S3Storage};
pub use temp::{TempFileManager, TempPath};

/// Default lifetime of signed URLs
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(3600);

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-/]{0,1023}$").expect("valid key regex"));

static EXTENSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,8}$").expect("valid extension regex"));

/// Remote object store
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Upload a local file under `key`, returning the stored key
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String>;

    /// Fetch the object at `key` into `local_path`
    async fn download(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Time-limited URL for reading `key`
    async fn signed_download_url(&self, key: &str, expires_in: Duration) -> Result<String>;

    /// Time-limited URL for a direct `PUT` of `key`
    async fn signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String>;
}

/// Reject keys that could escape a prefix or break URL signing
pub fn validate_key(key: &str) -> Result<()> {
    if !KEY_PATTERN.is_match(key) || key.split('/').any(|s| s == ".." || s == "." || s.is_empty()) {
        return Err(Error::InvalidInput(format!("invalid object key: {key:?}")));
    }
    Ok(())
}

/// Lower-cased extension of `filename` if it is short and alphanumeric
#[must_use]
pub fn sanitized_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    EXTENSION_PATTERN
        .is_match(ext)
        .then(|| ext.to_ascii_lowercase())
}

/// MIME type for an object, from its key's extension
#[must_use]
pub fn content_type_for(key: &str) -> &'static str {
    match sanitized_extension(key).as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mpg" | "mpeg") => "video/mpeg",
        Some("ts") => "video/mp2t",
        Some("3gp") => "video/3gpp",
        _ => "application/octet-stream",
    }
}

/// Key for a raw upload: `uploads/<uuid>.<ext>`
#[must_use]
pub fn upload_key(filename: &str) -> String {
    let ext = sanitized_extension(filename).unwrap_or_else(|| "mp4".to_string());
    format!("uploads/{}.{ext}", uuid::Uuid::new_v4())
}

/// Key for a rendered result: `processed/YYYY/MM/DD/<uuid>.mp4`
#[must_use]
pub fn output_key(now: DateTime<Utc>) -> String {
    format!(
        "processed/{}/{}.mp4",
        now.format("%Y/%m/%d"),
        uuid::Uuid::new_v4()
    )
}
