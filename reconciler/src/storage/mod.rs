pub mod local;
pub mod s3;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{Credentials, Region};
use common::Result;
use common::config::S3SheetConfig;
use std::sync::Arc;
use tracing::debug;

pub use local::LocalStorage;
pub use s3::{ObjectStorage, S3Storage};

/// Hands out one S3 client per bucket, built from the sheet's S3 settings.
#[derive(Clone)]
pub struct S3Manager {
    pub config: S3SheetConfig,
    client_cache: Arc<dashmap::DashMap<String, Arc<S3Client>>>,
}

impl S3Manager {
    pub fn new(config: S3SheetConfig) -> Self {
        Self {
            config,
            client_cache: Arc::new(dashmap::DashMap::new()),
        }
    }

    pub async fn get_client(&self, bucket: &str) -> Result<Arc<S3Client>> {
        if let Some(client) = self.client_cache.get(bucket) {
            return Ok(client.clone());
        }

        let region = Region::new(self.config.region.clone());
        let mut builder = if self.config.access_key.is_empty() {
            // Default credential chain: env vars, profile, instance metadata.
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&shared)
        } else {
            let credentials = Credentials::new(
                &self.config.access_key,
                &self.config.secret_key,
                None,
                None,
                "static",
            );
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(credentials)
        };

        if let Some(endpoint) = self.config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            debug!(endpoint, bucket, "Using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Arc::new(S3Client::from_conf(builder.build()));
        self.client_cache.insert(bucket.to_string(), client.clone());
        Ok(client)
    }

    /// Errors when the bucket is missing or the credentials cannot reach it.
    pub async fn verify_bucket_exists(&self, bucket: &str) -> Result<()> {
        let client = self.get_client(bucket).await?;
        client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                common::Error::Storage(format!("Sheet bucket {} is not reachable: {}", bucket, e))
            })?;
        debug!(bucket, "Sheet bucket reachable");
        Ok(())
    }
}
