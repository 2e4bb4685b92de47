// Error taxonomy shared by every handler, and its single mapping onto HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::storage::ObjectStoreError;

/// Coarse classification of an [`AppError`], which decides the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UpstreamFailure,
    PayloadTooLarge,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid key input: {0}")]
    InvalidKeyInput(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Malformed request parameters: {0}")]
    InvalidParameters(String),

    #[error("Malformed request body: {0}")]
    InvalidBody(String),

    #[error("Request body is empty")]
    EmptyBody,

    #[error("Payload exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] ObjectStoreError),

    #[error("Fetch failed: {0}")]
    FetchFailed(#[source] ObjectStoreError),

    #[error("Presign failed: {0}")]
    PresignFailed(#[source] ObjectStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::MissingParameter(_)
            | AppError::InvalidKeyInput(_)
            | AppError::InvalidId(_)
            | AppError::InvalidParameters(_)
            | AppError::InvalidBody(_)
            | AppError::EmptyBody => ErrorKind::InvalidInput,
            AppError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::UploadFailed(_)
            | AppError::FetchFailed(_)
            | AppError::PresignFailed(_)
            | AppError::Database(_) => ErrorKind::UpstreamFailure,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            // A failed relay is the gateway's upstream misbehaving, not ours.
            ErrorKind::UpstreamFailure if matches!(self, AppError::FetchFailed(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingParameter("key") => "key_required",
            AppError::MissingParameter("folder") => "folder_required",
            AppError::MissingParameter("folder_and_filename") => "folder_and_filename_required",
            AppError::MissingParameter(_) => "missing_parameter",
            AppError::InvalidKeyInput(_) => "invalid_key",
            AppError::InvalidId(_) => "bad_id",
            AppError::InvalidParameters(_) => "invalid_parameters",
            AppError::InvalidBody(_) => "invalid_body",
            AppError::EmptyBody => "empty_body",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::NotFound(_) => "not_found",
            AppError::UploadFailed(_) => "upload_failed",
            AppError::FetchFailed(_) => "fetch_failed",
            AppError::PresignFailed(_) => "presign_failed",
            AppError::Database(_) => "db_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Upstream detail stays in the logs, the caller only sees the code.
        match self.kind() {
            ErrorKind::UpstreamFailure => error!(code = self.code(), error = %self, "Request failed"),
            _ => warn!(code = self.code(), error = %self, "Request rejected"),
        }

        let body = serde_json::json!({
            "ok": false,
            "error": self.code(),
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Trimmed value of a required parameter, or `MissingParameter(name)` when
/// it is absent or blank.
pub fn required<'a>(value: Option<&'a str>, name: &'static str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::MissingParameter(name))
}
