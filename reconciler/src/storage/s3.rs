use crate::storage::S3Manager;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use bytes::Bytes;
use common::{Error, Result};
use std::sync::Arc;

/// Whole-object persistence used by the object-backed sheet.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;
    /// Fails with [`Error::NotFound`] when nothing is stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn check_file_exists(&self, key: &str) -> Result<bool>;
    /// Human-readable location, for logs and `status`.
    fn location(&self) -> String;
}

pub struct S3Storage {
    bucket: String,
    client: Arc<S3Client>,
}

impl S3Storage {
    pub async fn new(s3_manager: Arc<S3Manager>, bucket: &str) -> Result<Self> {
        let client = s3_manager.get_client(bucket).await?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let body = Bytes::copy_from_slice(data);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(body.into())
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) => Error::Storage(err.into_err().to_string()),
                _ => Error::Storage(e.to_string()),
            })?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) if err.err().is_no_such_key() => {
                    Error::NotFound(format!("s3://{}/{}", self.bucket, key))
                }
                SdkError::ServiceError(err) => Error::Storage(err.into_err().to_string()),
                _ => Error::Storage(e.to_string()),
            })?;

        let data = response.body.collect().await?.into_bytes().to_vec();

        Ok(data)
    }

    async fn check_file_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    fn location(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
