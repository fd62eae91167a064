//! Commune endpoints, addressed by code within a schema version.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::application::lifecycle::{RestoreCommand, RestoreScope, UnitTarget};
use crate::domain::units::{UnitLevel, UnitPatch};

use super::{
    DeletedListQuery, HistoryListQuery, VersionQuery, create_command, history_to_api, json_body,
    lifecycle_to_api, parse_level, parse_optional_uuid, parse_optional_version, parse_version,
    resolve_to_api,
};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{DeleteResponse, RestoreRequest, UnitCreateRequest};
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub struct RestoreQuery {
    pub schema_version: Option<String>,
    pub history_id: Option<String>,
}

pub async fn list_communes(
    State(state): State<ApiState>,
    Query(query): Query<VersionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let communes = state
        .resolver
        .list_communes(version, None)
        .await
        .map_err(resolve_to_api)?;
    Ok(Json(communes))
}

/// `id` is a province code (its communes) or a commune code (that commune).
pub async fn list_communes_of(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let communes = state
        .resolver
        .list_communes(version, Some(id.trim()))
        .await
        .map_err(resolve_to_api)?;
    Ok(Json(communes))
}

pub async fn create_commune(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<VersionQuery>,
    payload: Result<Json<UnitCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let command = create_command(
        json_body(payload)?,
        Some(UnitLevel::Commune),
        query.schema_version.as_deref(),
        None,
    )?;
    let actor = ApiState::actor(&headers);

    let created = state
        .lifecycle
        .create(actor.as_deref(), command)
        .await
        .map_err(lifecycle_to_api)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn put_commune(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(query): Query<VersionQuery>,
    payload: Result<Json<UnitCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let command = create_command(
        json_body(payload)?,
        Some(UnitLevel::Commune),
        query.schema_version.as_deref(),
        Some(code),
    )?;
    let actor = ApiState::actor(&headers);

    let created = state
        .lifecycle
        .create(actor.as_deref(), command)
        .await
        .map_err(lifecycle_to_api)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_commune(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(query): Query<VersionQuery>,
    payload: Result<Json<UnitPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let patch = json_body(payload)?;
    let actor = ApiState::actor(&headers);

    let updated = state
        .lifecycle
        .update(
            actor.as_deref(),
            UnitTarget::commune(version, code.trim()),
            patch,
        )
        .await
        .map_err(lifecycle_to_api)?;
    Ok(Json(updated))
}

pub async fn delete_commune(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_version(query.schema_version.as_deref())?;
    let actor = ApiState::actor(&headers);

    let deleted = state
        .lifecycle
        .soft_delete(actor.as_deref(), UnitTarget::commune(version, code.trim()))
        .await
        .map_err(lifecycle_to_api)?;
    Ok(Json(DeleteResponse {
        message: format!("Đã xoá đơn vị {}", deleted.code),
        unit: deleted,
    }))
}

/// Restore from an explicit history entry (query or body), else the latest
/// non-restore entry for the code. `schema_version` narrows that default.
pub async fn restore_commune(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(query): Query<RestoreQuery>,
    payload: Result<Option<Json<RestoreRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = payload
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?
        .and_then(|Json(body)| body.history_id);
    let history_id =
        parse_optional_uuid("history_id", query.history_id.as_deref())?.or(from_body);
    let scope = parse_optional_version(query.schema_version.as_deref())?.map(|version| {
        RestoreScope {
            schema_version: version,
            level: UnitLevel::Commune,
        }
    });
    let actor = ApiState::actor(&headers);

    let outcome = state
        .lifecycle
        .restore(
            actor.as_deref(),
            RestoreCommand {
                code,
                history_id,
                scope,
            },
        )
        .await
        .map_err(lifecycle_to_api)?;
    Ok(Json(outcome))
}

pub async fn list_recent_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .history
        .recent(query.limit)
        .await
        .map_err(history_to_api)?;
    Ok(Json(entries))
}

pub async fn list_code_history(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .history
        .for_code(&code)
        .await
        .map_err(history_to_api)?;
    Ok(Json(entries))
}

pub async fn list_deleted_units(
    State(state): State<ApiState>,
    Query(query): Query<DeletedListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let version = parse_optional_version(query.schema_version.as_deref())?;
    let level = parse_level(query.level.as_deref())?;
    let units = state
        .history
        .deleted_units(version, level)
        .await
        .map_err(history_to_api)?;
    Ok(Json(units))
}
