// In-process object store.
// Selected with STORAGE_PROVIDER=memory for local development and used by the
// router tests. Presigned URLs are shaped like S3 ones but point at a
// placeholder host and are not accepted anywhere.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::RwLock;
use url::Url;

use super::{ObjectMetadata, ObjectStore, ObjectStoreError, ObjectStream};

const CHUNK_SIZE: usize = 64 * 1024;
const PRESIGN_BASE_URL: &str = "http://memory.localhost";
const BUCKET: &str = "memory";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
}

impl StoredObject {
    fn metadata(&self) -> ObjectMetadata {
        ObjectMetadata {
            content_type: self.content_type.clone(),
            content_length: Some(self.data.len() as u64),
            etag: Some(self.etag.clone()),
        }
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn etag_for(data: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        format!("\"{:016x}\"", hasher.finish())
    }

    fn presign(
        method: &str,
        key: &str,
        content_type: Option<&str>,
        expiry_secs: u32,
    ) -> Result<String, ObjectStoreError> {
        let mut url = Url::parse(PRESIGN_BASE_URL)
            .map_err(|e| ObjectStoreError::Request(format!("bad presign base: {e}")))?;

        // Each key segment is percent-encoded; the separating `/` stay literal.
        url.path_segments_mut()
            .map_err(|_| ObjectStoreError::Request("presign base cannot carry a path".into()))?
            .pop_if_empty()
            .push(BUCKET)
            .extend(key.split('/'));

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("X-Amz-Method", method)
                .append_pair("X-Amz-Date", &Utc::now().format("%Y%m%dT%H%M%SZ").to_string());
            if let Some(content_type) = content_type {
                query
                    .append_pair("X-Amz-SignedHeaders", "content-type;host")
                    .append_pair("Content-Type", content_type);
            }
            query.append_pair("X-Amz-Expires", &expiry_secs.to_string());
        }

        Ok(url.into())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let object = StoredObject {
            etag: Self::etag_for(&body),
            data: body,
            content_type: content_type.to_string(),
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(StoredObject::metadata)
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, ObjectStoreError> {
        let object = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;

        let metadata = object.metadata();
        let data = object.data;
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|start| data.slice(start..(start + CHUNK_SIZE).min(data.len())))
            .collect();

        let body = futures::stream::iter(chunks.into_iter().map(Ok)).boxed();
        Ok(ObjectStream { metadata, body })
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, ObjectStoreError> {
        Self::presign("PUT", key, Some(content_type), expiry_secs)
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, ObjectStoreError> {
        Self::presign("GET", key, None, expiry_secs)
    }
}
