//! API handlers organized by resource.
//!
//! Query structs, parameter parsing and the service-error conversions shared
//! across modules live here.

mod bridge;
mod communes;
mod convert;
mod provinces;
mod system;
mod units;

pub use bridge::*;
pub use communes::*;
pub use convert::*;
pub use provinces::*;
pub use system::*;
pub use units::*;

// ----- Shared query structs -----

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub schema_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnitListQuery {
    pub search: Option<String>,
    pub level: Option<String>,
    pub schema_version: Option<String>,
    pub parent_code: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    pub level: Option<String>,
    pub schema_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiffQuery {
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeletedListQuery {
    pub schema_version: Option<String>,
    pub level: Option<String>,
}

// ----- Parameter parsing -----

use axum::Json;
use axum::extract::rejection::JsonRejection;
use uuid::Uuid;

use crate::application::lifecycle::CreateUnitCommand;
use crate::domain::units::{SchemaVersion, UnitLevel};

use super::models::UnitCreateRequest;

/// Absent means v2.
pub(crate) fn parse_version(raw: Option<&str>) -> Result<SchemaVersion, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::validation(format!("schema_version không hợp lệ: {value}"))),
        None => Ok(SchemaVersion::default()),
    }
}

pub(crate) fn parse_optional_version(
    raw: Option<&str>,
) -> Result<Option<SchemaVersion>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_version(Some(value)).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn parse_level(raw: Option<&str>) -> Result<Option<UnitLevel>, ApiError> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse()
                .map_err(|_| ApiError::validation(format!("level không hợp lệ: {value}")))
        })
        .transpose()
}

pub(crate) fn parse_uuid(label: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::validation(format!("{label} không hợp lệ: {raw}")))
}

pub(crate) fn parse_optional_uuid(label: &str, raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| parse_uuid(label, value))
        .transpose()
}

/// Unwrap a JSON body, turning extractor rejections into the API envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Build a create command; `code` from the path wins over the body.
pub(crate) fn create_command(
    body: UnitCreateRequest,
    default_level: Option<UnitLevel>,
    query_version: Option<&str>,
    path_code: Option<String>,
) -> Result<CreateUnitCommand, ApiError> {
    let schema_version = parse_version(body.schema_version.as_deref().or(query_version))?;
    let level = parse_level(body.level.as_deref())?
        .or(default_level)
        .ok_or_else(|| ApiError::validation("level là bắt buộc"))?;

    Ok(CreateUnitCommand {
        schema_version,
        level,
        code: path_code.or(body.code).unwrap_or_default(),
        parent_code: body.parent_code,
        province_code: body.province_code,
        name: body.name.unwrap_or_default(),
        english_name: body.english_name,
        administrative_level: body.administrative_level,
        decree: body.decree,
        boundary: body.boundary,
    })
}

// ----- Shared error conversions -----

use axum::http::StatusCode;

use crate::application::bridge::BridgeError;
use crate::application::fallback::FallbackError;
use crate::application::history::HistoryServiceError;
use crate::application::lifecycle::LifecycleError;
use crate::application::repos::RepoError;
use crate::application::resolver::ResolveError;
use crate::domain::tree::TreeError;

use super::error::{ApiError, FALLBACK_MESSAGE, STORE_MESSAGE, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { .. } => ApiError::from_error(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "Đơn vị đã tồn tại",
            &err,
        ),
        RepoError::NotFound => ApiError::not_found("Không tìm thấy dữ liệu"),
        RepoError::InvalidInput { message } => ApiError::validation(message),
        RepoError::Integrity { .. } => ApiError::from_error(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "Vi phạm ràng buộc dữ liệu",
            &err,
        ),
        RepoError::Timeout => ApiError::from_error(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Cơ sở dữ liệu không phản hồi",
            &err,
        ),
        RepoError::Persistence(_) => ApiError::from_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::STORE,
            STORE_MESSAGE,
            &err,
        ),
    }
}

pub(crate) fn fallback_to_api(err: FallbackError) -> ApiError {
    ApiError::from_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::FALLBACK,
        FALLBACK_MESSAGE,
        &err,
    )
}

pub(crate) fn resolve_to_api(err: ResolveError) -> ApiError {
    match err {
        ResolveError::Validation(message) => ApiError::validation(message),
        ResolveError::NotFound(message) => ApiError::not_found(message),
        ResolveError::Fallback(inner) => fallback_to_api(inner),
    }
}

pub(crate) fn lifecycle_to_api(err: LifecycleError) -> ApiError {
    match err {
        LifecycleError::Validation(message) => ApiError::validation(message),
        LifecycleError::NotFound(message) => ApiError::not_found(message),
        LifecycleError::Conflict(message) => ApiError::conflict(message),
        LifecycleError::ParentNotFound { .. } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::PARENT_NOT_FOUND,
            err.to_string(),
        ),
        LifecycleError::NothingToRestore { .. } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOTHING_TO_RESTORE,
            err.to_string(),
        ),
        LifecycleError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn history_to_api(err: HistoryServiceError) -> ApiError {
    match err {
        HistoryServiceError::Validation(message) => ApiError::validation(message),
        HistoryServiceError::NotFound(message) => ApiError::not_found(message),
        HistoryServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn bridge_to_api(err: BridgeError) -> ApiError {
    match err {
        BridgeError::Validation(message) => ApiError::validation(message),
        BridgeError::NotFound(message) => ApiError::not_found(message),
        BridgeError::Fallback(inner) => fallback_to_api(inner),
    }
}

pub(crate) fn tree_to_api(err: TreeError) -> ApiError {
    ApiError::validation(err.to_string())
}
