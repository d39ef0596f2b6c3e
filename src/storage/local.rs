//! Filesystem-backed storage: keys are paths under a root directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::{validate_key, StorageService};
use crate::error::{Error, Result};

/// Stores objects as files under `root`; "signed" URLs are `file://` URLs
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// Filesystem path backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String> {
        let dest = self.path_for(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &dest)
            .await
            .map_err(|e| Error::Storage(format!("Upload failed for {key}: {e}")))?;
        info!("Stored {} at {}", key, dest.display());
        Ok(key.to_string())
    }

    async fn download(&self, key: &str, local_path: &Path) -> Result<()> {
        let src = self.path_for(key)?;
        tokio::fs::copy(&src, local_path)
            .await
            .map_err(|e| Error::Storage(format!("Download failed for {key}: {e}")))?;
        Ok(())
    }

    async fn signed_download_url(&self, key: &str, _expires_in: Duration) -> Result<String> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Err(Error::Storage(format!("No such object: {key}")));
        }
        url::Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| Error::Storage(format!("Failed to build URL for {key}")))
    }

    async fn signed_upload_url(
        &self,
        key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> Result<String> {
        Err(Error::Storage(format!(
            "local storage cannot issue upload URLs (key {key})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("bucket")).unwrap();

        let src = dir.path().join("in.mp4");
        std::fs::write(&src, b"video bytes").unwrap();

        let key = storage.upload(&src, "processed/2026/x.mp4").await.unwrap();
        assert_eq!(key, "processed/2026/x.mp4");

        let back = dir.path().join("back.mp4");
        storage.download(&key, &back).await.unwrap();
        assert_eq!(std::fs::read(&back).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn signed_url_is_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let src = dir.path().join("in.mp4");
        std::fs::write(&src, b"x").unwrap();
        storage.upload(&src, "out.mp4").await.unwrap();

        let url = storage
            .signed_download_url("out.mp4", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/out.mp4"));
    }

    #[tokio::test]
    async fn missing_object_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let err = storage
            .download("nope.mp4", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn rejects_traversal_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let err = storage
            .upload(Path::new("/etc/hosts"), "../escape")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
