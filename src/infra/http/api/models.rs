use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::units::UnitRecord;

/// Body of `POST /communes`, `PUT /communes/{code}` and `POST /units`.
///
/// Fields are optional at the wire level so missing values surface as
/// validation errors rather than body rejections.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCreateRequest {
    #[serde(alias = "schema_version")]
    pub schema_version: Option<String>,
    pub level: Option<String>,
    pub code: Option<String>,
    #[serde(alias = "parent_code")]
    pub parent_code: Option<String>,
    #[serde(alias = "province_code")]
    pub province_code: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "english_name")]
    pub english_name: Option<String>,
    #[serde(alias = "administrative_level")]
    pub administrative_level: Option<String>,
    pub decree: Option<String>,
    pub boundary: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[serde(alias = "history_id")]
    pub history_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub address: Option<String>,
    #[serde(alias = "schema_version")]
    pub schema_version: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BridgeCodeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub unit: UnitRecord,
}
