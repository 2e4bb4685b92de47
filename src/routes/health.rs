use axum::{extract::State, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let now = state.images.ping().await?;

    Ok(Json(HealthResponse {
        ok: true,
        now: now.to_rfc3339(),
        storage: format!("{:?}", state.config.storage.provider).to_lowercase(),
    }))
}
