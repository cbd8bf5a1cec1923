use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use std::time::Duration;
use tracing::{debug, info};

/// Operations the worker needs on the raw-uploads bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short-lived GET URL for a raw upload.
    async fn signed_download_url(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Removes a raw upload once its derived assets are published.
    async fn delete_raw(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (raw uploads bucket: {})", bucket);

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn signed_download_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| anyhow!("Invalid presign TTL: {}", e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| anyhow!("Failed to presign {}: {}", key, e))?;

        debug!("Presigned download for {} (ttl {:?})", key, ttl);
        Ok(request.uri().to_string())
    }

    async fn delete_raw(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to delete {}: {}", key, e))?;

        Ok(())
    }
}
