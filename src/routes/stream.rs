use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, warn};

use crate::models::{AppState, KeyQuery};
use crate::storage::{ObjectMetadata, ObjectStoreError, DEFAULT_CONTENT_TYPE};
use crate::types::{required, AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream))
        .with_state(state)
}

fn metadata_headers(metadata: &ObjectMetadata) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let content_type = HeaderValue::from_str(&metadata.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);

    if let Some(len) = metadata.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    if let Some(etag) = metadata.etag.as_deref() {
        match HeaderValue::from_str(etag) {
            Ok(value) => {
                headers.insert(header::ETAG, value);
            }
            Err(_) => warn!(etag, "Dropping ETag that is not a valid header value"),
        }
    }

    headers
}

/// GET /stream?key=images/test.jpg
///
/// Relays the object chunk by chunk. If the client goes away the response
/// body is dropped, which drops the upstream read with it.
async fn stream(
    State(state): State<AppState>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|e| AppError::InvalidParameters(e.body_text()))?;
    let key = required(query.key.as_deref(), "key")?;

    let object = state.objects.get_object(key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(key) => AppError::NotFound(key),
        other => AppError::FetchFailed(other),
    })?;

    debug!(
        key,
        content_type = %object.metadata.content_type,
        content_length = ?object.metadata.content_length,
        "Streaming object"
    );

    let headers = metadata_headers(&object.metadata);
    Ok((headers, Body::from_stream(object.body)).into_response())
}
