use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use http_body_util::LengthLimitError;
use std::error::Error as StdError;
use tracing::info;

use crate::models::{AppState, UploadQuery, UploadResponse};
use crate::storage::{ObjectStore, StorageKey, DEFAULT_CONTENT_TYPE};
use crate::types::{required, AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .with_state(state)
}

/// Store `body` under `<folder>/<filename>` and return the key.
pub async fn upload_object(
    objects: &dyn ObjectStore,
    folder: &str,
    filename: &str,
    content_type: &str,
    body: Bytes,
) -> AppResult<StorageKey> {
    if body.is_empty() {
        return Err(AppError::EmptyBody);
    }

    let key = StorageKey::build(folder, Some(filename))?;

    objects
        .put_object(key.as_str(), body, content_type)
        .await
        .map_err(AppError::UploadFailed)?;

    Ok(key)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Tell a body over the limit apart from a body that failed to arrive.
fn read_error(err: axum::Error, limit: usize) -> AppError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return AppError::PayloadTooLarge { limit };
        }
        source = current.source();
    }
    AppError::InvalidBody(err.to_string())
}

/// POST /upload?folder=images&filename=test.jpg
async fn upload(
    State(state): State<AppState>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Body,
) -> AppResult<Json<UploadResponse>> {
    let Query(query) = query.map_err(|e| AppError::InvalidParameters(e.body_text()))?;
    let (folder, filename) = match (
        required(query.folder.as_deref(), "folder"),
        required(query.filename.as_deref(), "filename"),
    ) {
        (Ok(folder), Ok(filename)) => (folder, filename),
        _ => return Err(AppError::MissingParameter("folder_and_filename")),
    };

    let limit = state.config.upload.max_upload_bytes;
    if declared_length(&headers).is_some_and(|len| len > limit) {
        return Err(AppError::PayloadTooLarge { limit });
    }

    // Chunked bodies carry no length, so the limit is enforced while reading too.
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| read_error(e, limit))?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let size = body.len();
    let key = upload_object(state.objects.as_ref(), folder, filename, content_type, body).await?;

    info!(key = %key, size, content_type, "Object uploaded");

    Ok(Json(UploadResponse {
        ok: true,
        key: key.into_string(),
    }))
}
