use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::models::ImageRecord;
use crate::types::AppResult;

pub use operations::*;

pub mod operations;

#[cfg(test)]
pub mod memory;

/// Persistence for image key records.
///
/// Every method is a single statement against the backing store, so no
/// transaction spans more than one call.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Insert `key`, or return the existing record when it is already present.
    async fn upsert(&self, key: &str) -> AppResult<ImageRecord>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<ImageRecord>>;

    /// Round-trip to the database, returning its clock.
    async fn ping(&self) -> AppResult<DateTime<Utc>>;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;

    // Test connection
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await?;

    Ok(pool)
}
