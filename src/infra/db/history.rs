use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{HistoryRepo, RepoError},
    domain::{
        history::{HistoryAction, HistoryEntry},
        units::UnitSnapshot,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const HISTORY_COLUMNS: &str = "id, code, action, old_data, new_data, deleted, changed_at, changed_by";

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    code: String,
    action: HistoryAction,
    old_data: Option<Json<UnitSnapshot>>,
    new_data: Option<Json<UnitSnapshot>>,
    deleted: bool,
    changed_at: OffsetDateTime,
    changed_by: String,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            action: row.action,
            old_data: row.old_data.map(|Json(snapshot)| snapshot),
            new_data: row.new_data.map(|Json(snapshot)| snapshot),
            deleted: row.deleted,
            changed_at: row.changed_at,
            changed_by: row.changed_by,
        }
    }
}

#[async_trait]
impl HistoryRepo for PostgresRepositories {
    async fn append_entry(&self, entry: HistoryEntry) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO unit_history \
                (id, code, action, old_data, new_data, deleted, changed_at, changed_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.code)
        .bind(entry.action)
        .bind(entry.old_data.map(Json))
        .bind(entry.new_data.map(Json))
        .bind(entry.deleted)
        .bind(entry.changed_at)
        .bind(entry.changed_by)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_for_code(&self, code: &str) -> Result<Vec<HistoryEntry>, RepoError> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM unit_history WHERE code = $1 ORDER BY changed_at, seq"
        ))
        .bind(code)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, RepoError> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM unit_history \
             ORDER BY changed_at DESC, seq DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<HistoryEntry>, RepoError> {
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM unit_history WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(HistoryEntry::from))
    }
}
