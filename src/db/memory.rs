// In-memory ImageStore used by the router tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::ImageStore;
use crate::models::ImageRecord;
use crate::types::AppResult;

#[derive(Default)]
pub struct MemoryImageStore {
    rows: Mutex<Vec<ImageRecord>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count_key(&self, key: &str) -> usize {
        self.rows.lock().await.iter().filter(|r| r.key == key).count()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upsert(&self, key: &str) -> AppResult<ImageRecord> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.iter().find(|r| r.key == key) {
            return Ok(existing.clone());
        }

        let record = ImageRecord {
            id: rows.len() as i64 + 1,
            key: key.to_string(),
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<ImageRecord>> {
        Ok(self.rows.lock().await.iter().find(|r| r.id == id).cloned())
    }

    async fn ping(&self) -> AppResult<DateTime<Utc>> {
        Ok(Utc::now())
    }
}
