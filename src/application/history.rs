use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{DeletedScope, HistoryRepo, RepoError, UnitQuery, UnitsRepo};
use crate::domain::history::{FieldChange, HistoryEntry, diff_snapshots};
use crate::domain::units::{SchemaVersion, UnitLevel, UnitRecord};

pub const DEFAULT_RECENT_LIMIT: u32 = 100;
pub const MAX_RECENT_LIMIT: u32 = 500;

#[derive(Debug, Error)]
pub enum HistoryServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDiff {
    pub code: String,
    pub old_id: Uuid,
    pub new_id: Uuid,
    pub changes: Vec<FieldChange>,
}

/// Read side of the history log.
#[derive(Clone)]
pub struct HistoryService {
    units: Arc<dyn UnitsRepo>,
    history: Arc<dyn HistoryRepo>,
}

impl HistoryService {
    pub fn new(units: Arc<dyn UnitsRepo>, history: Arc<dyn HistoryRepo>) -> Self {
        Self { units, history }
    }

    pub async fn for_code(&self, code: &str) -> Result<Vec<HistoryEntry>, HistoryServiceError> {
        Ok(self.history.list_for_code(code.trim()).await?)
    }

    pub async fn for_unit(&self, id: Uuid) -> Result<Vec<HistoryEntry>, HistoryServiceError> {
        let unit = self.unit(id).await?;
        self.for_code(&unit.code).await
    }

    /// Newest entries first; `limit` is clamped to `1..=MAX_RECENT_LIMIT`.
    pub async fn recent(&self, limit: Option<u32>) -> Result<Vec<HistoryEntry>, HistoryServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        Ok(self.history.list_recent(limit).await?)
    }

    pub async fn deleted_units(
        &self,
        schema_version: Option<SchemaVersion>,
        level: Option<UnitLevel>,
    ) -> Result<Vec<UnitRecord>, HistoryServiceError> {
        let query = UnitQuery {
            schema_version,
            levels: level.into_iter().collect(),
            deleted: DeletedScope::Deleted,
            ..Default::default()
        };
        Ok(self.units.list_units(&query).await?)
    }

    /// Field-level changes between the states recorded by two entries of a unit.
    pub async fn diff(
        &self,
        unit_id: Uuid,
        old_id: Option<Uuid>,
        new_id: Option<Uuid>,
    ) -> Result<HistoryDiff, HistoryServiceError> {
        let (Some(old_id), Some(new_id)) = (old_id, new_id) else {
            return Err(HistoryServiceError::Validation(
                "Cần cả hai tham số old và new".to_string(),
            ));
        };

        let unit = self.unit(unit_id).await?;
        let old = self.entry_of(&unit.code, old_id).await?;
        let new = self.entry_of(&unit.code, new_id).await?;

        Ok(HistoryDiff {
            code: unit.code,
            old_id,
            new_id,
            changes: diff_snapshots(old.resulting_state(), new.resulting_state()),
        })
    }

    async fn unit(&self, id: Uuid) -> Result<UnitRecord, HistoryServiceError> {
        self.units
            .find_by_id(id)
            .await?
            .ok_or_else(|| HistoryServiceError::NotFound(format!("Không tìm thấy đơn vị với id {id}")))
    }

    async fn entry_of(&self, code: &str, id: Uuid) -> Result<HistoryEntry, HistoryServiceError> {
        match self.history.find_entry(id).await? {
            Some(entry) if entry.code == code => Ok(entry),
            _ => Err(HistoryServiceError::NotFound(format!(
                "Không tìm thấy bản ghi lịch sử {id}"
            ))),
        }
    }
}
