// S3-compatible object store backed by rust-s3.
// Works against AWS S3, Cloudflare R2 and MinIO. All requests use
// path-style addressing (`<endpoint>/<bucket>/<key>`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{header, HeaderMap, HeaderValue};
use bytes::Bytes;
use futures::StreamExt;
use s3::error::S3Error;
use tracing::{debug, info};

use super::{
    ObjectMetadata, ObjectStore, ObjectStoreError, ObjectStream, DEFAULT_CONTENT_TYPE,
};
use crate::config::StorageConfig;

pub struct S3ObjectStore {
    bucket: Box<s3::Bucket>,
}

fn map_s3_error(key: &str, err: S3Error) -> ObjectStoreError {
    match err {
        S3Error::HttpFailWithBody(404, _) => ObjectStoreError::NotFound(key.to_string()),
        other => ObjectStoreError::Request(other.to_string()),
    }
}

fn check_status(key: &str, status: u16) -> Result<(), ObjectStoreError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(ObjectStoreError::NotFound(key.to_string())),
        code => Err(ObjectStoreError::Request(format!(
            "unexpected status {} for {}",
            code, key
        ))),
    }
}

impl S3ObjectStore {
    pub fn new(bucket: Box<s3::Bucket>) -> Self {
        Self { bucket }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let endpoint = config
            .s3_endpoint
            .as_deref()
            .context("S3_ENDPOINT must be set for the s3 storage provider")?;

        let region = s3::Region::Custom {
            region: config.s3_region.clone(),
            endpoint: endpoint.to_string(),
        };

        let credentials = s3::creds::Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .context("Invalid S3 credentials")?;

        let bucket = s3::Bucket::new(&config.s3_bucket, region, credentials)
            .context("Failed to initialise S3 bucket")?
            .with_path_style();

        info!(
            endpoint = %endpoint,
            bucket = %config.s3_bucket,
            region = %config.s3_region,
            "S3 object store configured"
        );

        Ok(Self::new(bucket))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &body, content_type)
            .await
            .map_err(|e| map_s3_error(key, e))?;

        check_status(key, response.status_code())?;
        debug!(key, size = body.len(), content_type, "Stored object");
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        let (head, status) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| map_s3_error(key, e))?;

        check_status(key, status)?;

        Ok(ObjectMetadata {
            content_type: head
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            content_length: head.content_length.and_then(|len| u64::try_from(len).ok()),
            etag: head.e_tag,
        })
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, ObjectStoreError> {
        // The streaming GET does not surface response headers, so metadata
        // comes from a HEAD issued first.
        let metadata = self.head_object(key).await?;

        let response = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|e| map_s3_error(key, e))?;

        check_status(key, response.status_code)?;

        let body = response
            .bytes
            .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string())))
            .boxed();

        Ok(ObjectStream { metadata, body })
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, ObjectStoreError> {
        let value = HeaderValue::from_str(content_type).map_err(|_| {
            ObjectStoreError::Request(format!("content type {content_type:?} is not a header value"))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, value);

        self.bucket
            .presign_put(key, expiry_secs, Some(headers), None)
            .await
            .map_err(|e| ObjectStoreError::Request(format!("presign PUT failed: {e}")))
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, ObjectStoreError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| ObjectStoreError::Request(format!("presign GET failed: {e}")))
    }
}
