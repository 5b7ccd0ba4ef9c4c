//! Bucket-scoped object storage over an S3-compatible endpoint.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::config::BucketNames;
use crate::errors::AppError;

pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(3600);
/// Links embedded in rendered documents outlive a normal browsing session.
pub const RENDER_SIGNED_URL_TTL: Duration = Duration::from_secs(36000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Certificates,
    Cvs,
    PortfolioImages,
}

impl Bucket {
    pub fn name<'a>(&self, names: &'a BucketNames) -> &'a str {
        match self {
            Bucket::Certificates => &names.certificates,
            Bucket::Cvs => &names.cvs,
            Bucket::PortfolioImages => &names.portfolio_images,
        }
    }
}

/// Storage path for a new object owned by `uid`: `{uid}/{uuid}{ext}`.
pub fn object_path(uid: &str, ext: &str) -> String {
    format!("{uid}/{}{ext}", Uuid::new_v4())
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), AppError>;

    async fn remove(&self, bucket: Bucket, path: &str) -> Result<(), AppError>;

    async fn signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, AppError>;
}

pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    buckets: BucketNames,
}

impl S3ObjectStorage {
    pub fn new(client: aws_sdk_s3::Client, buckets: BucketNames) -> Self {
        Self { client, buckets }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket.name(&self.buckets))
            .key(path)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("upload of {path} failed: {e}")))?;
        info!("Uploaded {size} bytes to {:?}/{path}", bucket);
        Ok(())
    }

    async fn remove(&self, bucket: Bucket, path: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(bucket.name(&self.buckets))
            .key(path)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("removal of {path} failed: {e}")))?;
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::Storage(format!("invalid signed URL expiry: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket.name(&self.buckets))
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("signing {path} failed: {e}")))?;
        Ok(request.uri().to_string())
    }
}
