use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::domain::units::SchemaVersion;
use crate::infra::http::api::state::ApiState;
use crate::infra::http::db_health_response;

pub async fn health(State(state): State<ApiState>) -> Response {
    db_health_response(state.health.check().await)
}

/// Drop cached fallback documents so the next read goes back to disk.
pub async fn reload_fallback(State(state): State<ApiState>) -> impl IntoResponse {
    for version in [SchemaVersion::V1, SchemaVersion::V2] {
        state.fallback.invalidate(version).await;
    }
    info!(target = "dvhc::http", "fallback cache invalidated");
    StatusCode::NO_CONTENT
}
