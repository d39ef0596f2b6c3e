//! S3-compatible object storage (AWS S3, Cloudflare R2, `MinIO`)
//!
//! The client uses static credentials, path-style addressing, adaptive retry
//! and explicit connect/read timeouts. Signed URLs are `SigV4` presigned
//! requests generated locally; no network round trip is needed to issue one.

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{content_type_for, validate_key, StorageService};
use crate::error::{Error, Result};

/// Connection settings for an S3-compatible bucket
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// API endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// R2 accepts `auto`
    pub region: String,
    pub max_attempts: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: String::new(),
            region: "auto".to_string(),
            max_attempts: 3,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("max_attempts", &self.max_attempts)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

impl S3Config {
    /// True once endpoint, bucket and credentials are all set
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.endpoint_url.is_empty()
            && !self.bucket.is_empty()
            && !self.access_key_id.is_empty()
            && !self.secret_access_key.is_empty()
    }
}

fn sdk_err<E>(context: String) -> impl FnOnce(E) -> Error
where
    E: std::error::Error,
{
    move |e| Error::Storage(format!("{context}: {}", DisplayErrorContext(&e)))
}

/// Storage backed by an S3-compatible bucket
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: &S3Config) -> Result<Self> {
        if !config.is_configured() {
            return Err(Error::Storage(
                "Failed to initialize storage client: endpoint, bucket and credentials are required"
                    .to_string(),
            ));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "poseflow-static",
        );

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build();

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::adaptive().with_max_attempts(config.max_attempts))
            .timeout_config(timeouts)
            .build();

        info!(
            "S3 storage client ready (endpoint={}, bucket={})",
            config.endpoint_url, config.bucket
        );

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn presigning(key: &str, expires_in: Duration) -> Result<PresigningConfig> {
        PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::Storage(format!("Invalid URL expiry for {key}: {e}")))
    }
}

#[async_trait]
impl StorageService for S3Storage {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String> {
        validate_key(key)?;

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::Storage(format!("Upload failed for {key}: {e}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .body(body)
            .send()
            .await
            .map_err(sdk_err(format!("Upload failed for {key}")))?;

        info!("Uploaded {} to bucket {}", key, self.bucket);
        Ok(key.to_string())
    }

    async fn download(&self, key: &str, local_path: &Path) -> Result<()> {
        validate_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_err(format!("Download failed for {key}")))?;

        let mut body = output.body;
        let mut file = tokio::fs::File::create(local_path).await?;
        let mut total = 0usize;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(sdk_err(format!("Download failed for {key}")))?;
            file.write_all(&chunk).await?;
            total += chunk.len();
        }
        file.flush().await?;

        debug!("Downloaded {} ({} bytes) to {}", key, total, local_path.display());
        Ok(())
    }

    async fn signed_download_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        validate_key(key)?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning(key, expires_in)?)
            .await
            .map_err(sdk_err(format!("Failed to generate signed URL for {key}")))?;

        Ok(request.uri().to_string())
    }

    async fn signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String> {
        validate_key(key)?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning(key, expires_in)?)
            .await
            .map_err(sdk_err(format!("Failed to generate upload URL for {key}")))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            endpoint_url: "https://account.r2.cloudflarestorage.com".to_string(),
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            bucket: "poses".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let text = format!("{:?}", config());
        assert!(text.contains("AKIDEXAMPLE"));
        assert!(!text.contains("wJalrXUtnFEMI"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn unconfigured_client_is_rejected() {
        let err = S3Storage::new(&S3Config::default()).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn defaults_match_retry_policy() {
        let config = S3Config::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.read_timeout_secs, 30);
        assert_eq!(config.region, "auto");
    }

    #[tokio::test]
    async fn presigned_download_url_is_path_style() {
        let storage = S3Storage::new(&config()).unwrap();
        let url = storage
            .signed_download_url("processed/out.mp4", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("https://account.r2.cloudflarestorage.com/poses/processed/out.mp4?"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn presigned_upload_url_signs_put() {
        let storage = S3Storage::new(&config()).unwrap();
        let url = storage
            .signed_upload_url("uploads/a.mp4", "video/mp4", Duration::from_secs(900))
            .await
            .unwrap();

        assert!(url.contains("/poses/uploads/a.mp4?"));
        assert!(url.contains("X-Amz-Expires=900"));
    }

    #[tokio::test]
    async fn expiry_over_a_week_is_rejected() {
        let storage = S3Storage::new(&config()).unwrap();
        let err = storage
            .signed_download_url("a.mp4", Duration::from_secs(8 * 24 * 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
