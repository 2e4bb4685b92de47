use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::ImageStore;
use crate::models::ImageRecord;
use crate::types::{AppError, AppResult};

/// PostgreSQL-backed [`ImageStore`] over the `images` table.
#[derive(Clone)]
pub struct PgImageStore {
    pool: PgPool,
}

impl PgImageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ImageStore for PgImageStore {
    async fn upsert(&self, key: &str) -> AppResult<ImageRecord> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let record = sqlx::query_as::<_, ImageRecord>(
            r#"
            INSERT INTO images (r2_key) VALUES ($1)
            ON CONFLICT (r2_key) DO UPDATE SET r2_key = EXCLUDED.r2_key
            RETURNING id, r2_key
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = record.id, key = %record.key, "Upserted image record");
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<ImageRecord>> {
        let record = sqlx::query_as::<_, ImageRecord>(
            "SELECT id, r2_key FROM images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn ping(&self) -> AppResult<DateTime<Utc>> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
            .fetch_one(&self.pool)
            .await?;

        Ok(now)
    }
}

/// Parse a record id taken from the request path.
///
/// Only positive base-10 integers are accepted.
pub fn parse_image_id(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidId(raw.to_string())),
    }
}
