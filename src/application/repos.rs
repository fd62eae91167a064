//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::history::HistoryEntry;
use crate::domain::units::{SchemaVersion, UnitLevel, UnitRecord, UnitSnapshot};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which side of the soft-delete marker a query sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedScope {
    #[default]
    Active,
    Deleted,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct UnitQuery {
    pub schema_version: Option<SchemaVersion>,
    pub levels: Vec<UnitLevel>,
    pub code: Option<String>,
    pub parent_codes: Vec<String>,
    pub search: Option<String>,
    pub deleted: DeletedScope,
    pub limit: Option<u32>,
}

impl UnitQuery {
    pub fn active(schema_version: SchemaVersion) -> Self {
        Self {
            schema_version: Some(schema_version),
            ..Default::default()
        }
    }

    pub fn level(mut self, level: UnitLevel) -> Self {
        self.levels.push(level);
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_codes.push(parent_code.into());
        self
    }

    pub fn parents<I, S>(mut self, parent_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_codes
            .extend(parent_codes.into_iter().map(Into::into));
        self
    }

    /// In-memory evaluation of the filter, shared by adapters that cannot push
    /// it down to a query language.
    pub fn matches(&self, unit: &UnitRecord) -> bool {
        let deleted_ok = match self.deleted {
            DeletedScope::Active => !unit.is_deleted,
            DeletedScope::Deleted => unit.is_deleted,
            DeletedScope::All => true,
        };
        if !deleted_ok {
            return false;
        }
        if self
            .schema_version
            .is_some_and(|version| version != unit.schema_version)
        {
            return false;
        }
        if !self.levels.is_empty() && !self.levels.contains(&unit.level) {
            return false;
        }
        if self.code.as_deref().is_some_and(|code| code != unit.code) {
            return false;
        }
        if !self.parent_codes.is_empty()
            && !unit
                .parent()
                .is_some_and(|parent| self.parent_codes.iter().any(|p| p == parent))
        {
            return false;
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.to_lowercase();
            let hit = unit.name.to_lowercase().contains(&needle)
                || unit.code.contains(search)
                || unit
                    .english_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct UpdateUnitParams {
    pub id: Uuid,
    pub snapshot: UnitSnapshot,
    pub deleted_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait UnitsRepo: Send + Sync {
    /// Units matching `query`, ordered by schema version, level, then code.
    async fn list_units(&self, query: &UnitQuery) -> Result<Vec<UnitRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UnitRecord>, RepoError>;

    /// Lookup by the `(schema_version, level, code)` unique key, soft-deleted included.
    async fn find_by_key(
        &self,
        schema_version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<Option<UnitRecord>, RepoError>;
}

#[async_trait]
pub trait UnitsWriteRepo: Send + Sync {
    async fn insert_unit(&self, snapshot: UnitSnapshot) -> Result<UnitRecord, RepoError>;

    /// Overwrite every mutable field of the unit with `params.snapshot`.
    async fn update_unit(&self, params: UpdateUnitParams) -> Result<UnitRecord, RepoError>;

    async fn soft_delete_unit(
        &self,
        id: Uuid,
        deleted_at: OffsetDateTime,
    ) -> Result<UnitRecord, RepoError>;

    /// Hard-delete units soft-deleted before `cutoff`; returns the number removed.
    async fn purge_deleted(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HistoryRepo: Send + Sync {
    async fn append_entry(&self, entry: HistoryEntry) -> Result<(), RepoError>;

    /// Entries for `code`, oldest first.
    async fn list_for_code(&self, code: &str) -> Result<Vec<HistoryEntry>, RepoError>;

    /// Newest entries across all codes.
    async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, RepoError>;

    async fn find_entry(&self, id: Uuid) -> Result<Option<HistoryEntry>, RepoError>;
}
