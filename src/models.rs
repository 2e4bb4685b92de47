use std::sync::Arc;

use crate::config::Config;
use crate::db::ImageStore;
use crate::storage::ObjectStore;

/// Capabilities shared by all handlers. Built once in `main` and cloned
/// into each request; holds no mutable state of its own.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub objects: Arc<dyn ObjectStore>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(config: Config, objects: Arc<dyn ObjectStore>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            config: Arc::new(config),
            objects,
            images,
        }
    }
}

// Note: FromRow is used with runtime query_as (no DATABASE_URL at compile time)

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct ImageRecord {
    pub id: i64,
    #[sqlx(rename = "r2_key")]
    pub key: String,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize)]
pub struct UploadQuery {
    pub folder: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub key: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignPutRequest {
    pub folder: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignPutResponse {
    pub ok: bool,
    pub key: String,
    pub put_url: String,
    /// Content type the client is expected to send with the PUT
    pub content_type: String,
    pub expires_in: u32,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignGetResponse {
    pub ok: bool,
    pub key: String,
    pub get_url: String,
    pub expires_in: u32,
}

#[derive(Debug, serde::Deserialize)]
pub struct SaveKeyRequest {
    pub key: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ImageResponse {
    pub ok: bool,
    pub image: ImageRecord,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub now: String,
    pub storage: String,
}
