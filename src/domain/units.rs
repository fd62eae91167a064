//! Administrative unit records shared by the repository, fallback and HTTP layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Hierarchy generation a unit belongs to.
///
/// `V1` is the legacy province → district → commune layout, `V2` the
/// post-reform province → ward layout (wards are stored as communes).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "schema_version", rename_all = "lowercase")]
pub enum SchemaVersion {
    V1,
    #[default]
    V2,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
        }
    }

    /// Number of tiers below (and including) the province.
    pub fn depth(self) -> usize {
        match self {
            SchemaVersion::V1 => 3,
            SchemaVersion::V2 => 2,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(SchemaVersion::V1),
            "v2" | "2" => Ok(SchemaVersion::V2),
            other => Err(DomainError::UnknownVersion(other.to_string())),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "unit_level", rename_all = "lowercase")]
pub enum UnitLevel {
    Province,
    District,
    Commune,
}

impl UnitLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitLevel::Province => "province",
            UnitLevel::District => "district",
            UnitLevel::Commune => "commune",
        }
    }

    /// Rank from the top of the hierarchy; provinces are `0`.
    pub fn rank(self) -> u8 {
        match self {
            UnitLevel::Province => 0,
            UnitLevel::District => 1,
            UnitLevel::Commune => 2,
        }
    }
}

impl fmt::Display for UnitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitLevel {
    type Err = DomainError;

    /// Accepts the ingestion aliases (`ward`, `city`, ...) and folds them into
    /// the three stored levels.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "province" | "city" => Ok(UnitLevel::Province),
            "district" => Ok(UnitLevel::District),
            "commune" | "ward" | "town" => Ok(UnitLevel::Commune),
            other => Err(DomainError::UnknownLevel(other.to_string())),
        }
    }
}

/// Derived key enforcing the only hard uniqueness constraint on units.
pub fn unique_key(schema_version: SchemaVersion, level: UnitLevel, code: &str) -> String {
    format!("{}-{}-{}", schema_version, level, code)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub id: Uuid,
    pub schema_version: SchemaVersion,
    pub level: UnitLevel,
    pub code: String,
    pub parent_code: Option<String>,
    pub name: String,
    pub english_name: Option<String>,
    pub administrative_level: Option<String>,
    pub decree: Option<String>,
    pub boundary: Option<serde_json::Value>,
    pub unique_key: String,
    pub is_deleted: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UnitRecord {
    /// Parent code with empty strings treated as absent.
    pub fn parent(&self) -> Option<&str> {
        self.parent_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            schema_version: self.schema_version,
            level: self.level,
            code: self.code.clone(),
            parent_code: self.parent_code.clone(),
            name: self.name.clone(),
            english_name: self.english_name.clone(),
            administrative_level: self.administrative_level.clone(),
            decree: self.decree.clone(),
            boundary: self.boundary.clone(),
            is_deleted: self.is_deleted,
        }
    }
}

/// Point-in-time copy of a unit's mutable state, stored in history entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub schema_version: SchemaVersion,
    pub level: UnitLevel,
    pub code: String,
    #[serde(default)]
    pub parent_code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub english_name: Option<String>,
    #[serde(default)]
    pub administrative_level: Option<String>,
    #[serde(default)]
    pub decree: Option<String>,
    #[serde(default)]
    pub boundary: Option<serde_json::Value>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl UnitSnapshot {
    pub fn unique_key(&self) -> String {
        unique_key(self.schema_version, self.level, &self.code)
    }
}

/// Shallow patch applied by updates; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPatch {
    pub parent_code: Option<String>,
    pub name: Option<String>,
    pub english_name: Option<String>,
    pub administrative_level: Option<String>,
    pub decree: Option<String>,
    pub boundary: Option<serde_json::Value>,
}

impl UnitPatch {
    pub fn is_empty(&self) -> bool {
        self.parent_code.is_none()
            && self.name.is_none()
            && self.english_name.is_none()
            && self.administrative_level.is_none()
            && self.decree.is_none()
            && self.boundary.is_none()
    }

    pub fn apply(&self, snapshot: &mut UnitSnapshot) {
        if let Some(parent) = self.parent_code.as_ref() {
            let trimmed = parent.trim();
            snapshot.parent_code = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(name) = self.name.as_ref() {
            snapshot.name = name.trim().to_string();
        }
        if let Some(value) = self.english_name.as_ref() {
            snapshot.english_name = Some(value.clone());
        }
        if let Some(value) = self.administrative_level.as_ref() {
            snapshot.administrative_level = Some(value.clone());
        }
        if let Some(value) = self.decree.as_ref() {
            snapshot.decree = Some(value.clone());
        }
        if let Some(value) = self.boundary.as_ref() {
            snapshot.boundary = Some(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_key_scopes_code_by_version_and_level() {
        assert_eq!(
            unique_key(SchemaVersion::V1, UnitLevel::Commune, "00001"),
            "v1-commune-00001"
        );
        assert_ne!(
            unique_key(SchemaVersion::V1, UnitLevel::Commune, "01"),
            unique_key(SchemaVersion::V2, UnitLevel::Commune, "01")
        );
    }

    #[test]
    fn ward_alias_folds_into_commune() {
        assert_eq!("ward".parse::<UnitLevel>().unwrap(), UnitLevel::Commune);
        assert_eq!(" Province ".parse::<UnitLevel>().unwrap(), UnitLevel::Province);
        assert!("hamlet".parse::<UnitLevel>().is_err());
    }

    #[test]
    fn patch_clears_parent_on_blank_value() {
        let mut snapshot = UnitSnapshot {
            schema_version: SchemaVersion::V2,
            level: UnitLevel::Commune,
            code: "00004".into(),
            parent_code: Some("01".into()),
            name: "Ba Đình".into(),
            english_name: None,
            administrative_level: Some("Phường".into()),
            decree: None,
            boundary: None,
            is_deleted: false,
        };
        let patch = UnitPatch {
            parent_code: Some("  ".into()),
            name: Some(" Ngọc Hà ".into()),
            ..Default::default()
        };

        patch.apply(&mut snapshot);

        assert_eq!(snapshot.parent_code, None);
        assert_eq!(snapshot.name, "Ngọc Hà");
        assert_eq!(snapshot.administrative_level.as_deref(), Some("Phường"));
    }
}
