use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::catalog::UnitSearch;
use crate::application::lifecycle::UnitTarget;
use crate::domain::tree::build_tree_from_value;
use crate::domain::units::UnitPatch;

use super::{
    DiffQuery, RestoreQuery, TreeQuery, UnitListQuery, create_command, history_to_api, json_body,
    lifecycle_to_api, parse_level, parse_optional_uuid, parse_optional_version, parse_uuid,
    parse_version, repo_to_api, tree_to_api,
};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{DeleteResponse, RestoreRequest, UnitCreateRequest};
use crate::infra::http::api::state::ApiState;

pub async fn list_units(
    State(state): State<ApiState>,
    Query(query): Query<UnitListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let search = UnitSearch {
        search: query.search,
        schema_version: parse_optional_version(query.schema_version.as_deref())?,
        level: parse_level(query.level.as_deref())?,
        parent_code: query
            .parent_code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty()),
        include_deleted: query.include_deleted,
        limit: query.limit,
    };

    let units = state.catalog.search(search).await.map_err(repo_to_api)?;
    Ok(Json(units))
}

pub async fn get_unit(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("id", &id)?;
    match state.catalog.find(id).await.map_err(repo_to_api)? {
        Some(unit) => Ok(Json(unit)),
        None => Err(ApiError::not_found(format!(
            "Không tìm thấy đơn vị với id {id}"
        ))),
    }
}

pub async fn create_unit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<UnitCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let command = create_command(json_body(payload)?, None, None, None)?;
    let actor = ApiState::actor(&headers);

    let created = state
        .lifecycle
        .create(actor.as_deref(), command)
        .await
        .map_err(lifecycle_to_api)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Serves both `PUT` and `PATCH`; either way only supplied fields change.
pub async fn update_unit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UnitPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("id", &id)?;
    let patch = json_body(payload)?;
    let actor = ApiState::actor(&headers);

    let updated = state
        .lifecycle
        .update(actor.as_deref(), UnitTarget::Id(id), patch)
        .await
        .map_err(lifecycle_to_api)?;
    Ok(Json(updated))
}

pub async fn delete_unit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("id", &id)?;
    let actor = ApiState::actor(&headers);

    let deleted = state
        .lifecycle
        .soft_delete(actor.as_deref(), UnitTarget::Id(id))
        .await
        .map_err(lifecycle_to_api)?;
    Ok(Json(DeleteResponse {
        message: format!("Đã xoá đơn vị {}", deleted.code),
        unit: deleted,
    }))
}

pub async fn unit_history(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("id", &id)?;
    let entries = state
        .history
        .for_unit(id)
        .await
        .map_err(history_to_api)?;
    Ok(Json(entries))
}

pub async fn restore_unit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<RestoreQuery>,
    payload: Result<Option<Json<RestoreRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("id", &id)?;
    let from_body = payload
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?
        .and_then(|Json(body)| body.history_id);
    let history_id =
        parse_optional_uuid("history_id", query.history_id.as_deref())?.or(from_body);
    let actor = ApiState::actor(&headers);

    let outcome = state
        .lifecycle
        .restore_by_id(actor.as_deref(), id, history_id)
        .await
        .map_err(lifecycle_to_api)?;
    Ok(Json(outcome))
}

pub async fn unit_tree(
    State(state): State<ApiState>,
    Query(query): Query<TreeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let level = parse_level(query.level.as_deref())?;
    let tree = state
        .catalog
        .tree(version, level)
        .await
        .map_err(repo_to_api)?;
    Ok(Json(tree))
}

/// Arrange caller-supplied records; nothing is read from storage.
pub async fn arrange_units(
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let tree = build_tree_from_value(json_body(payload)?).map_err(tree_to_api)?;
    Ok(Json(tree))
}

pub async fn unit_diff(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("id", &id)?;
    let old = parse_optional_uuid("old", query.old.as_deref())?;
    let new = parse_optional_uuid("new", query.new.as_deref())?;

    let diff = state
        .history
        .diff(id, old, new)
        .await
        .map_err(history_to_api)?;
    Ok(Json(diff))
}
