use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        DeletedScope, RepoError, UnitQuery, UnitsRepo, UnitsWriteRepo, UpdateUnitParams,
    },
    domain::units::{SchemaVersion, UnitLevel, UnitRecord, UnitSnapshot},
};

use super::util::contains_pattern;
use super::{PostgresRepositories, map_sqlx_error};

const UNIT_COLUMNS: &str = "id, schema_version, level, code, parent_code, name, english_name, \
     administrative_level, decree, boundary, unique_key, is_deleted, deleted_at, created_at, \
     updated_at";

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: Uuid,
    schema_version: SchemaVersion,
    level: UnitLevel,
    code: String,
    parent_code: Option<String>,
    name: String,
    english_name: Option<String>,
    administrative_level: Option<String>,
    decree: Option<String>,
    boundary: Option<Value>,
    unique_key: String,
    is_deleted: bool,
    deleted_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UnitRow> for UnitRecord {
    fn from(row: UnitRow) -> Self {
        Self {
            id: row.id,
            schema_version: row.schema_version,
            level: row.level,
            code: row.code,
            parent_code: row.parent_code,
            name: row.name,
            english_name: row.english_name,
            administrative_level: row.administrative_level,
            decree: row.decree,
            boundary: row.boundary,
            unique_key: row.unique_key,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    fn push_unit_filter(qb: &mut QueryBuilder<'_, Postgres>, query: &UnitQuery) {
        match query.deleted {
            DeletedScope::Active => {
                qb.push(" AND is_deleted = FALSE");
            }
            DeletedScope::Deleted => {
                qb.push(" AND is_deleted = TRUE");
            }
            DeletedScope::All => {}
        }

        if let Some(version) = query.schema_version {
            qb.push(" AND schema_version = ");
            qb.push_bind(version);
        }

        if !query.levels.is_empty() {
            qb.push(" AND level IN (");
            let mut levels = qb.separated(", ");
            for level in &query.levels {
                levels.push_bind(*level);
            }
            qb.push(")");
        }

        if let Some(code) = query.code.as_ref() {
            qb.push(" AND code = ");
            qb.push_bind(code.clone());
        }

        if !query.parent_codes.is_empty() {
            qb.push(" AND parent_code IN (");
            let mut parents = qb.separated(", ");
            for parent in &query.parent_codes {
                parents.push_bind(parent.clone());
            }
            qb.push(")");
        }

        if let Some(search) = query.search.as_ref() {
            let pattern = contains_pattern(search.trim());
            qb.push(" AND (name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR english_name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR code ILIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }
    }
}

#[async_trait]
impl UnitsRepo for PostgresRepositories {
    async fn list_units(&self, query: &UnitQuery) -> Result<Vec<UnitRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {UNIT_COLUMNS} FROM administrative_units WHERE 1=1"
        ));
        Self::push_unit_filter(&mut qb, query);
        qb.push(" ORDER BY schema_version, level, code");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb
            .build_query_as::<UnitRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UnitRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UnitRecord>, RepoError> {
        let row = sqlx::query_as::<_, UnitRow>(&format!(
            "SELECT {UNIT_COLUMNS} FROM administrative_units WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UnitRecord::from))
    }

    async fn find_by_key(
        &self,
        schema_version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<Option<UnitRecord>, RepoError> {
        let row = sqlx::query_as::<_, UnitRow>(&format!(
            "SELECT {UNIT_COLUMNS} FROM administrative_units \
             WHERE schema_version = $1 AND level = $2 AND code = $3"
        ))
        .bind(schema_version)
        .bind(level)
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UnitRecord::from))
    }
}

#[async_trait]
impl UnitsWriteRepo for PostgresRepositories {
    async fn insert_unit(&self, snapshot: UnitSnapshot) -> Result<UnitRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let unique_key = snapshot.unique_key();
        let deleted_at = snapshot.is_deleted.then_some(now);

        let row = sqlx::query_as::<_, UnitRow>(&format!(
            "INSERT INTO administrative_units (\
                id, schema_version, level, code, parent_code, name, english_name, \
                administrative_level, decree, boundary, unique_key, is_deleted, deleted_at, \
                created_at, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) \
             RETURNING {UNIT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(snapshot.schema_version)
        .bind(snapshot.level)
        .bind(snapshot.code)
        .bind(snapshot.parent_code)
        .bind(snapshot.name)
        .bind(snapshot.english_name)
        .bind(snapshot.administrative_level)
        .bind(snapshot.decree)
        .bind(snapshot.boundary)
        .bind(unique_key)
        .bind(snapshot.is_deleted)
        .bind(deleted_at)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UnitRecord::from(row))
    }

    async fn update_unit(&self, params: UpdateUnitParams) -> Result<UnitRecord, RepoError> {
        let UpdateUnitParams {
            id,
            snapshot,
            deleted_at,
        } = params;
        let deleted_at = if snapshot.is_deleted {
            Some(deleted_at.unwrap_or_else(OffsetDateTime::now_utc))
        } else {
            None
        };

        let row = sqlx::query_as::<_, UnitRow>(&format!(
            "UPDATE administrative_units SET \
                parent_code = $2, name = $3, english_name = $4, administrative_level = $5, \
                decree = $6, boundary = $7, is_deleted = $8, deleted_at = $9, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {UNIT_COLUMNS}"
        ))
        .bind(id)
        .bind(snapshot.parent_code)
        .bind(snapshot.name)
        .bind(snapshot.english_name)
        .bind(snapshot.administrative_level)
        .bind(snapshot.decree)
        .bind(snapshot.boundary)
        .bind(snapshot.is_deleted)
        .bind(deleted_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UnitRecord::from).ok_or(RepoError::NotFound)
    }

    async fn soft_delete_unit(
        &self,
        id: Uuid,
        deleted_at: OffsetDateTime,
    ) -> Result<UnitRecord, RepoError> {
        let row = sqlx::query_as::<_, UnitRow>(&format!(
            "UPDATE administrative_units \
             SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND is_deleted = FALSE \
             RETURNING {UNIT_COLUMNS}"
        ))
        .bind(id)
        .bind(deleted_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UnitRecord::from).ok_or(RepoError::NotFound)
    }

    async fn purge_deleted(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "DELETE FROM administrative_units WHERE is_deleted = TRUE AND deleted_at < $1",
        )
        .bind(cutoff)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
