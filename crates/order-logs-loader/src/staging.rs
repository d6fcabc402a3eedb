//! Staging bucket access

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{error::DisplayErrorContext, types::Object, Client};
use tracing::{debug, info, instrument, warn};

use crate::error::StagingError;

/// A file waiting in the staging bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingObject {
    pub bucket: String,
    pub key: String,
    /// Size in bytes
    pub size: i64,
    /// Opaque content fingerprint, quotes included as S3 returns it
    pub etag: String,
}

impl StagingObject {
    /// Convert a listing entry; entries without a key yield `None`
    pub fn from_listing(bucket: &str, object: &Object) -> Option<Self> {
        let key = object.key()?;
        Some(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: object.size().unwrap_or(0),
            etag: object.e_tag().unwrap_or_default().to_string(),
        })
    }
}

/// List and delete operations on the staging bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// One listing page of `bucket`: no pagination, no prefix
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StagingObject>, StagingError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StagingError>;
}

/// [`ObjectStore`] backed by S3
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Path-style addressing is needed for MinIO and LocalStack endpoints
    pub fn from_sdk_config(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();
        Self::new(Client::from_conf(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StagingObject>, StagingError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StagingError::List {
                bucket: bucket.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        if response.is_truncated().unwrap_or(false) {
            warn!(
                bucket,
                "Listing is truncated; objects beyond the first page are left for the next run"
            );
        }

        let objects: Vec<StagingObject> = response
            .contents()
            .iter()
            .filter_map(|object| {
                let staged = StagingObject::from_listing(bucket, object);
                if staged.is_none() {
                    warn!(bucket, "Skipping listing entry without a key");
                }
                staged
            })
            .collect();

        for object in &objects {
            debug!(key = %object.key, size = object.size, etag = %object.etag, "Listed staging object");
        }
        info!(bucket, count = objects.len(), "Listed staging bucket");

        Ok(objects)
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StagingError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StagingError::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!("Deleted s3://{}/{}", bucket, key);
        Ok(())
    }
}
