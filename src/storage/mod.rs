//! Object storage layer (S3-compatible)
//!
//! Handlers talk to storage only through the [`ObjectStore`] trait. The
//! S3 implementation lives in `s3_client`, and `memory` keeps objects in
//! process for local runs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::config::{StorageConfig, StorageProvider};

pub mod key;
pub mod memory;
pub mod s3_client;

pub use key::*;
pub use memory::MemoryObjectStore;
pub use s3_client::S3ObjectStore;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store request failed: {0}")]
    Request(String),
}

/// Attributes relayed to the caller when an object is streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
}

pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// An object opened for reading. The body is pulled lazily from the store.
pub struct ObjectStream {
    pub metadata: ObjectMetadata,
    pub body: ByteStream,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `key` with the given content type.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    /// Fetch metadata without the body.
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, ObjectStoreError>;

    /// Open an object for streaming.
    async fn get_object(&self, key: &str) -> Result<ObjectStream, ObjectStoreError>;

    /// Signed URL allowing a client to PUT directly to `key`. The content type
    /// is part of the signature, so the upload must send the same header.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, ObjectStoreError>;

    /// Signed URL allowing a client to GET `key` directly.
    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, ObjectStoreError>;
}

/// Build the configured object store.
pub fn create_object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.provider {
        StorageProvider::S3 => Ok(Arc::new(S3ObjectStore::from_config(config)?)),
        StorageProvider::Memory => {
            tracing::warn!("Using in-memory object store, objects are lost on restart");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
    }
}
