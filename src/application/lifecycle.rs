//! Create, update, soft-delete and restore for administrative units.
//!
//! Every state change is applied to the repository, then recorded in the
//! history log, then mirrored into the fallback store. The three writes are
//! independent: a failure part-way leaves them out of step and nothing is
//! rolled back. Fallback mirroring never fails the operation.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::fallback::{FallbackNode, FallbackStore, Placement};
use crate::application::repos::{
    HistoryRepo, RepoError, UnitQuery, UnitsRepo, UnitsWriteRepo, UpdateUnitParams,
};
use crate::application::resolver::walk_to_province;
use crate::domain::history::{HistoryAction, HistoryEntry};
use crate::domain::units::{SchemaVersion, UnitLevel, UnitPatch, UnitRecord, UnitSnapshot};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Không tìm thấy đơn vị cha với mã {code}")]
    ParentNotFound { code: String },
    #[error("Không có dữ liệu để khôi phục cho mã {code}")]
    NothingToRestore { code: String },
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for LifecycleError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => {
                LifecycleError::Conflict(format!("Đơn vị đã tồn tại ({constraint})"))
            }
            other => LifecycleError::Repo(other),
        }
    }
}

/// How a caller addresses an existing unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitTarget {
    Id(Uuid),
    Key {
        schema_version: SchemaVersion,
        level: UnitLevel,
        code: String,
    },
}

impl UnitTarget {
    pub fn commune(schema_version: SchemaVersion, code: impl Into<String>) -> Self {
        UnitTarget::Key {
            schema_version,
            level: UnitLevel::Commune,
            code: code.into(),
        }
    }

    fn describe(&self) -> String {
        match self {
            UnitTarget::Id(id) => format!("Không tìm thấy đơn vị với id {id}"),
            UnitTarget::Key { code, .. } => format!("Không tìm thấy đơn vị với mã {code}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUnitCommand {
    pub schema_version: SchemaVersion,
    pub level: UnitLevel,
    pub code: String,
    pub parent_code: Option<String>,
    /// Alternative spelling of the parent for communes attached straight to a province.
    pub province_code: Option<String>,
    pub name: String,
    pub english_name: Option<String>,
    pub administrative_level: Option<String>,
    pub decree: Option<String>,
    pub boundary: Option<serde_json::Value>,
}

/// Restricts which history entries a default restore may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreScope {
    pub schema_version: SchemaVersion,
    pub level: UnitLevel,
}

impl RestoreScope {
    fn admits(&self, entry: &HistoryEntry) -> bool {
        entry.restorable_state().is_some_and(|state| {
            state.schema_version == self.schema_version && state.level == self.level
        })
    }
}

#[derive(Debug, Clone)]
pub struct RestoreCommand {
    pub code: String,
    pub history_id: Option<Uuid>,
    pub scope: Option<RestoreScope>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub unit: UnitRecord,
    pub restored_from: Uuid,
    pub entry: HistoryEntry,
}

#[derive(Clone)]
pub struct UnitLifecycleService {
    reader: Arc<dyn UnitsRepo>,
    writer: Arc<dyn UnitsWriteRepo>,
    history: Arc<dyn HistoryRepo>,
    fallback: Arc<dyn FallbackStore>,
}

impl UnitLifecycleService {
    pub fn new(
        reader: Arc<dyn UnitsRepo>,
        writer: Arc<dyn UnitsWriteRepo>,
        history: Arc<dyn HistoryRepo>,
        fallback: Arc<dyn FallbackStore>,
    ) -> Self {
        Self {
            reader,
            writer,
            history,
            fallback,
        }
    }

    pub async fn create(
        &self,
        actor: Option<&str>,
        command: CreateUnitCommand,
    ) -> Result<UnitRecord, LifecycleError> {
        let code = ensure_non_empty(&command.code, "code")?;
        let name = ensure_non_empty(&command.name, "name")?;

        if self
            .reader
            .find_by_key(command.schema_version, command.level, &code)
            .await?
            .is_some()
        {
            return Err(LifecycleError::Conflict(format!(
                "Đơn vị với mã {code} đã tồn tại"
            )));
        }

        let parent_code = [command.parent_code.as_deref(), command.province_code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string);

        let parent_code = match (command.level, parent_code) {
            (UnitLevel::Province, _) => None,
            (UnitLevel::Commune, None) => {
                return Err(LifecycleError::Validation(
                    "parentCode hoặc provinceCode là bắt buộc".to_string(),
                ));
            }
            (level, Some(parent)) => {
                self.ensure_parent(command.schema_version, level, &parent)
                    .await?;
                Some(parent)
            }
            (_, None) => None,
        };

        let snapshot = UnitSnapshot {
            schema_version: command.schema_version,
            level: command.level,
            code: code.clone(),
            parent_code,
            name,
            english_name: command.english_name,
            administrative_level: command.administrative_level,
            decree: command.decree,
            boundary: command.boundary,
            is_deleted: false,
        };

        let created = self.writer.insert_unit(snapshot).await?;
        self.history
            .append_entry(HistoryEntry::new(
                &created.code,
                HistoryAction::Create,
                None,
                Some(created.snapshot()),
                actor,
            ))
            .await?;

        info!(
            target = "dvhc::lifecycle",
            unique_key = %created.unique_key,
            "unit created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: Option<&str>,
        target: UnitTarget,
        patch: UnitPatch,
    ) -> Result<UnitRecord, LifecycleError> {
        if patch.is_empty() {
            return Err(LifecycleError::Validation(
                "Không có trường nào để cập nhật".to_string(),
            ));
        }
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(LifecycleError::Validation(
                "name không được để trống".to_string(),
            ));
        }

        let current = self.active_unit(&target).await?;
        let before = current.snapshot();
        let mut after = before.clone();
        patch.apply(&mut after);

        let updated = self
            .writer
            .update_unit(UpdateUnitParams {
                id: current.id,
                snapshot: after,
                deleted_at: None,
            })
            .await?;

        self.history
            .append_entry(HistoryEntry::new(
                &updated.code,
                HistoryAction::Update,
                Some(before),
                Some(updated.snapshot()),
                actor,
            ))
            .await?;

        info!(
            target = "dvhc::lifecycle",
            unique_key = %updated.unique_key,
            "unit updated"
        );
        Ok(updated)
    }

    pub async fn soft_delete(
        &self,
        actor: Option<&str>,
        target: UnitTarget,
    ) -> Result<UnitRecord, LifecycleError> {
        let current = self.active_unit(&target).await?;
        let before = current.snapshot();

        let deleted = self
            .writer
            .soft_delete_unit(current.id, OffsetDateTime::now_utc())
            .await?;

        self.history
            .append_entry(HistoryEntry::new(
                &deleted.code,
                HistoryAction::Delete,
                Some(before),
                None,
                actor,
            ))
            .await?;

        if let Err(err) = self
            .fallback
            .remove_unit(deleted.schema_version, deleted.level, &deleted.code)
            .await
        {
            warn!(
                target = "dvhc::lifecycle",
                code = %deleted.code,
                schema_version = %deleted.schema_version,
                error = %err,
                "failed to remove unit from fallback store"
            );
        }

        info!(
            target = "dvhc::lifecycle",
            unique_key = %deleted.unique_key,
            "unit soft-deleted"
        );
        Ok(deleted)
    }

    /// Bring a unit back to the state captured by a history entry.
    ///
    /// Without an explicit entry the most recent non-restore entry for the
    /// code is used, so repeating a restore reapplies the same state.
    pub async fn restore(
        &self,
        actor: Option<&str>,
        command: RestoreCommand,
    ) -> Result<RestoreOutcome, LifecycleError> {
        let code = ensure_non_empty(&command.code, "code")?;
        let source = self.pick_entry(&code, &command).await?;

        let mut state = source
            .restorable_state()
            .cloned()
            .ok_or_else(|| LifecycleError::NothingToRestore { code: code.clone() })?;
        state.is_deleted = false;

        let existing = self
            .reader
            .find_by_key(state.schema_version, state.level, &state.code)
            .await?;

        let (before, restored) = match existing {
            Some(unit) => {
                let before = unit.snapshot();
                let restored = self
                    .writer
                    .update_unit(UpdateUnitParams {
                        id: unit.id,
                        snapshot: state,
                        deleted_at: None,
                    })
                    .await?;
                (Some(before), restored)
            }
            None => (None, self.writer.insert_unit(state).await?),
        };

        let entry = HistoryEntry::new(
            &restored.code,
            HistoryAction::Restore,
            before,
            Some(restored.snapshot()),
            actor,
        );
        self.history.append_entry(entry.clone()).await?;

        self.mirror_into_fallback(&restored).await;

        info!(
            target = "dvhc::lifecycle",
            unique_key = %restored.unique_key,
            history_id = %source.id,
            "unit restored"
        );
        Ok(RestoreOutcome {
            unit: restored,
            restored_from: source.id,
            entry,
        })
    }

    /// Restore addressed by unit id; the unit may be soft-deleted.
    pub async fn restore_by_id(
        &self,
        actor: Option<&str>,
        id: Uuid,
        history_id: Option<Uuid>,
    ) -> Result<RestoreOutcome, LifecycleError> {
        let unit = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(UnitTarget::Id(id).describe()))?;

        self.restore(
            actor,
            RestoreCommand {
                code: unit.code,
                history_id,
                scope: Some(RestoreScope {
                    schema_version: unit.schema_version,
                    level: unit.level,
                }),
            },
        )
        .await
    }

    async fn pick_entry(
        &self,
        code: &str,
        command: &RestoreCommand,
    ) -> Result<HistoryEntry, LifecycleError> {
        if let Some(id) = command.history_id {
            return match self.history.find_entry(id).await? {
                Some(entry) if entry.code == code => Ok(entry),
                _ => Err(LifecycleError::NotFound(format!(
                    "Không tìm thấy bản ghi lịch sử {id} cho mã {code}"
                ))),
            };
        }

        let entries = self.history.list_for_code(code).await?;
        entries
            .into_iter()
            .rev()
            .filter(|entry| entry.action != HistoryAction::Restore)
            .find(|entry| command.scope.is_none_or(|scope| scope.admits(entry)))
            .ok_or_else(|| {
                LifecycleError::NotFound(format!("Không tìm thấy lịch sử cho mã {code}"))
            })
    }

    async fn active_unit(&self, target: &UnitTarget) -> Result<UnitRecord, LifecycleError> {
        let found = match target {
            UnitTarget::Id(id) => self.reader.find_by_id(*id).await?,
            UnitTarget::Key {
                schema_version,
                level,
                code,
            } => {
                self.reader
                    .find_by_key(*schema_version, *level, code)
                    .await?
            }
        };

        found
            .filter(UnitRecord::is_active)
            .ok_or_else(|| LifecycleError::NotFound(target.describe()))
    }

    async fn ensure_parent(
        &self,
        schema_version: SchemaVersion,
        level: UnitLevel,
        parent_code: &str,
    ) -> Result<(), LifecycleError> {
        let candidates = self
            .reader
            .list_units(
                &UnitQuery::active(schema_version)
                    .code(parent_code)
                    .level(UnitLevel::Province)
                    .level(UnitLevel::District),
            )
            .await?;

        if candidates
            .iter()
            .any(|candidate| candidate.level.rank() < level.rank())
        {
            Ok(())
        } else {
            Err(LifecycleError::ParentNotFound {
                code: parent_code.to_string(),
            })
        }
    }

    async fn mirror_into_fallback(&self, unit: &UnitRecord) {
        let province_code = if unit.level == UnitLevel::Province {
            Some(unit.code.clone())
        } else {
            match walk_to_province(self.reader.as_ref(), unit.clone()).await {
                Ok(chain) => chain.and_then(|chain| chain.last().map(|p| p.code.clone())),
                Err(err) => {
                    warn!(
                        target = "dvhc::lifecycle",
                        code = %unit.code,
                        error = %err,
                        "failed to resolve province for fallback store"
                    );
                    return;
                }
            }
        };

        let Some(province_code) = province_code else {
            warn!(
                target = "dvhc::lifecycle",
                code = %unit.code,
                "unit has no reachable province; fallback store left unchanged"
            );
            return;
        };

        let node = FallbackNode {
            code: unit.code.clone(),
            name: unit.name.clone(),
            level: unit.level,
            english_name: unit.english_name.clone(),
            administrative_level: unit.administrative_level.clone(),
            children: Vec::new(),
        };

        match self
            .fallback
            .insert_unit(unit.schema_version, &province_code, unit.parent(), node)
            .await
        {
            Ok(Placement::Inserted | Placement::AlreadyPresent) => {}
            Ok(Placement::ParentMissing) => warn!(
                target = "dvhc::lifecycle",
                code = %unit.code,
                schema_version = %unit.schema_version,
                province_code = %province_code,
                parent_code = unit.parent().unwrap_or_default(),
                "parent missing from fallback store; unit not re-inserted"
            ),
            Err(err) => warn!(
                target = "dvhc::lifecycle",
                code = %unit.code,
                schema_version = %unit.schema_version,
                error = %err,
                "failed to re-insert unit into fallback store"
            ),
        }
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<String, LifecycleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Validation(format!(
            "{field} không được để trống"
        )));
    }
    Ok(trimmed.to_string())
}
