use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::models::{AppState, KeyQuery, PresignGetResponse, PresignPutRequest, PresignPutResponse};
use crate::storage::{StorageKey, DEFAULT_CONTENT_TYPE};
use crate::types::{required, AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/presign-put", post(presign_put))
        .route("/presign-get", get(presign_get))
        .with_state(state)
}

/// POST /presign-put - signed URL for a direct client upload to a fresh key
async fn presign_put(
    State(state): State<AppState>,
    payload: Result<Json<PresignPutRequest>, JsonRejection>,
) -> AppResult<Json<PresignPutResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidBody(e.body_text()))?;

    let folder = required(request.folder.as_deref(), "folder")?;
    let content_type = request
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let key = StorageKey::generate(folder)?;
    let expires_in = state.config.upload.presign_put_expiry_secs;

    let put_url = state
        .objects
        .presign_put(key.as_str(), &content_type, expires_in)
        .await
        .map_err(AppError::PresignFailed)?;

    info!(key = %key, content_type = %content_type, expires_in, "Issued presigned PUT");

    Ok(Json(PresignPutResponse {
        ok: true,
        key: key.into_string(),
        put_url,
        content_type,
        expires_in,
    }))
}

/// GET /presign-get?key= - signed URL for a direct client download
async fn presign_get(
    State(state): State<AppState>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> AppResult<Json<PresignGetResponse>> {
    let Query(query) = query.map_err(|e| AppError::InvalidParameters(e.body_text()))?;
    let key = required(query.key.as_deref(), "key")?;
    let expires_in = state.config.upload.presign_get_expiry_secs;

    let get_url = state
        .objects
        .presign_get(key, expires_in)
        .await
        .map_err(AppError::PresignFailed)?;

    info!(key, expires_in, "Issued presigned GET");

    Ok(Json(PresignGetResponse {
        ok: true,
        key: key.to_string(),
        get_url,
        expires_in,
    }))
}
