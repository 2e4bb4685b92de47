//! Image key records
//!
//! - `POST /images` - save a storage key, idempotent per key
//! - `GET /images/{id}` - look a record up by id

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::db::parse_image_id;
use crate::models::{AppState, ImageResponse, SaveKeyRequest};
use crate::types::{required, AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/images", post(save_key))
        .route("/images/{id}", get(get_image))
        .with_state(state)
}

async fn save_key(
    State(state): State<AppState>,
    payload: Result<Json<SaveKeyRequest>, JsonRejection>,
) -> AppResult<Json<ImageResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidBody(e.body_text()))?;
    let key = required(request.key.as_deref(), "key")?;

    let image = state.images.upsert(key).await?;
    info!(id = image.id, key = %image.key, "Saved image key");

    Ok(Json(ImageResponse { ok: true, image }))
}

async fn get_image(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> AppResult<Json<ImageResponse>> {
    let Path(raw_id) = raw_id.map_err(|e| AppError::InvalidParameters(e.body_text()))?;
    let id = parse_image_id(&raw_id)?;

    let image = state
        .images
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("image {id}")))?;

    Ok(Json(ImageResponse { ok: true, image }))
}
