use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;

use super::{VersionQuery, json_body, parse_version, resolve_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::ConvertRequest;
use crate::infra::http::api::state::ApiState;

pub async fn convert_address(
    State(state): State<ApiState>,
    Query(query): Query<VersionQuery>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(payload)?;
    let version = parse_version(
        body.schema_version
            .as_deref()
            .or(query.schema_version.as_deref()),
    )?;
    let address = body
        .address
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| ApiError::validation("address là bắt buộc"))?;

    let conversion = state
        .resolver
        .convert_address(version, &address)
        .await
        .map_err(resolve_to_api)?;
    Ok(Json(conversion))
}
