use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Longest validity window S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_EXPIRY_SECS: u32 = 604_800;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Memory,
}

impl FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "r2" => Ok(StorageProvider::S3),
            "memory" => Ok(StorageProvider::Memory),
            other => bail!("Unknown STORAGE_PROVIDER '{}', expected 's3' or 'memory'", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
    pub presign_put_expiry_secs: u32,
    pub presign_get_expiry_secs: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            presign_put_expiry_secs: 300,
            presign_get_expiry_secs: 600,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let upload_defaults = UploadConfig::default();

        let config = Self {
            server: ServerConfig {
                port: parse_var("PORT", "8080")?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            database: DatabaseConfig {
                url: non_empty_var("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: parse_var("DB_MAX_CONNECTIONS", "10")?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", "1")?,
                acquire_timeout_secs: parse_var("DB_ACQUIRE_TIMEOUT_SECS", "30")?,
            },
            storage: StorageConfig {
                provider: parse_var("STORAGE_PROVIDER", "s3")?,
                s3_bucket: env::var("S3_BUCKET").unwrap_or_default(),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
                s3_access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: non_empty_var("S3_ENDPOINT"),
            },
            upload: UploadConfig {
                max_upload_bytes: parse_var(
                    "MAX_UPLOAD_BYTES",
                    &upload_defaults.max_upload_bytes.to_string(),
                )?,
                presign_put_expiry_secs: parse_var(
                    "PRESIGN_PUT_EXPIRY_SECS",
                    &upload_defaults.presign_put_expiry_secs.to_string(),
                )?,
                presign_get_expiry_secs: parse_var(
                    "PRESIGN_GET_EXPIRY_SECS",
                    &upload_defaults.presign_get_expiry_secs.to_string(),
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would only fail once requests arrive.
    pub fn validate(&self) -> Result<()> {
        if self.storage.provider == StorageProvider::S3 {
            let mut missing = Vec::new();
            if self.storage.s3_bucket.trim().is_empty() {
                missing.push("S3_BUCKET");
            }
            if self.storage.s3_endpoint.is_none() {
                missing.push("S3_ENDPOINT");
            }
            if self.storage.s3_access_key_id.is_none() {
                missing.push("AWS_ACCESS_KEY_ID");
            }
            if self.storage.s3_secret_access_key.is_none() {
                missing.push("AWS_SECRET_ACCESS_KEY");
            }
            if !missing.is_empty() {
                bail!("S3 storage configuration incomplete, missing: {}", missing.join(", "));
            }
        }

        for (name, secs) in [
            ("PRESIGN_PUT_EXPIRY_SECS", self.upload.presign_put_expiry_secs),
            ("PRESIGN_GET_EXPIRY_SECS", self.upload.presign_get_expiry_secs),
        ] {
            if secs == 0 || secs > MAX_PRESIGN_EXPIRY_SECS {
                bail!(
                    "{} must be between 1 and {} seconds, got {}",
                    name,
                    MAX_PRESIGN_EXPIRY_SECS,
                    secs
                );
            }
        }

        if self.upload.max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }

        if self.database.min_connections > self.database.max_connections {
            bail!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        Ok(())
    }
}


#[cfg(test)]
pub(crate) use tests::memory_config;
