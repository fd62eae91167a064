use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;

use super::{bridge_to_api, json_body};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::BridgeCodeRequest;
use crate::infra::http::api::state::ApiState;

pub async fn map_code(
    State(state): State<ApiState>,
    payload: Result<Json<BridgeCodeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let code = json_body(payload)?.code.unwrap_or_default();
    let mapping = state.bridge.map_code(&code).await.map_err(bridge_to_api)?;
    Ok(Json(mapping))
}
