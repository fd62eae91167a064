use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use super::{VersionQuery, parse_version, resolve_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_provinces(
    State(state): State<ApiState>,
    Query(query): Query<VersionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let provinces = state
        .resolver
        .list_provinces(version)
        .await
        .map_err(resolve_to_api)?;
    Ok(Json(provinces))
}

pub async fn list_districts(
    State(state): State<ApiState>,
    Query(query): Query<VersionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let districts = state
        .resolver
        .list_districts(version, None)
        .await
        .map_err(resolve_to_api)?;
    Ok(Json(districts))
}

pub async fn list_province_districts(
    State(state): State<ApiState>,
    Path(province_code): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let districts = state
        .resolver
        .list_districts(version, Some(province_code.trim()))
        .await
        .map_err(resolve_to_api)?;
    Ok(Json(districts))
}
