#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use dvhc::application::fallback::FallbackStore;
use dvhc::application::repos::{
    HistoryRepo, RepoError, UnitQuery, UnitsRepo, UnitsWriteRepo, UpdateUnitParams,
};
use dvhc::domain::history::HistoryEntry;
use dvhc::domain::units::{SchemaVersion, UnitLevel, UnitRecord, UnitSnapshot};
use dvhc::infra::fallback::JsonFileFallbackStore;
use dvhc::infra::http::{ApiState, HealthProbe};

/// Units and history kept in memory; reads can be switched to fail.
#[derive(Default)]
pub struct MemoryRepo {
    units: Mutex<Vec<UnitRecord>>,
    history: Mutex<Vec<HistoryEntry>>,
    failing_reads: AtomicBool,
}

impl MemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub async fn seed(
        &self,
        version: SchemaVersion,
        level: UnitLevel,
        code: &str,
        parent: Option<&str>,
        name: &str,
    ) -> UnitRecord {
        self.insert_unit(snapshot(version, level, code, parent, name))
            .await
            .unwrap()
    }

    pub async fn units(&self) -> Vec<UnitRecord> {
        self.units.lock().await.clone()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().await.clone()
    }

    fn check_reads(&self) -> Result<(), RepoError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("connection refused".into()));
        }
        Ok(())
    }
}

pub fn snapshot(
    version: SchemaVersion,
    level: UnitLevel,
    code: &str,
    parent: Option<&str>,
    name: &str,
) -> UnitSnapshot {
    UnitSnapshot {
        schema_version: version,
        level,
        code: code.to_string(),
        parent_code: parent.map(str::to_string),
        name: name.to_string(),
        english_name: None,
        administrative_level: None,
        decree: None,
        boundary: None,
        is_deleted: false,
    }
}

fn apply_snapshot(unit: &mut UnitRecord, snapshot: UnitSnapshot) {
    unit.parent_code = snapshot.parent_code;
    unit.name = snapshot.name;
    unit.english_name = snapshot.english_name;
    unit.administrative_level = snapshot.administrative_level;
    unit.decree = snapshot.decree;
    unit.boundary = snapshot.boundary;
    unit.is_deleted = snapshot.is_deleted;
}

#[async_trait]
impl UnitsRepo for MemoryRepo {
    async fn list_units(&self, query: &UnitQuery) -> Result<Vec<UnitRecord>, RepoError> {
        self.check_reads()?;
        let mut found: Vec<UnitRecord> = self
            .units
            .lock()
            .await
            .iter()
            .filter(|unit| query.matches(unit))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (a.schema_version.as_str(), a.level.rank(), &a.code).cmp(&(
                b.schema_version.as_str(),
                b.level.rank(),
                &b.code,
            ))
        });
        if let Some(limit) = query.limit {
            found.truncate(limit as usize);
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UnitRecord>, RepoError> {
        self.check_reads()?;
        Ok(self
            .units
            .lock()
            .await
            .iter()
            .find(|unit| unit.id == id)
            .cloned())
    }

    async fn find_by_key(
        &self,
        schema_version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<Option<UnitRecord>, RepoError> {
        self.check_reads()?;
        Ok(self
            .units
            .lock()
            .await
            .iter()
            .find(|unit| {
                unit.schema_version == schema_version && unit.level == level && unit.code == code
            })
            .cloned())
    }
}

#[async_trait]
impl UnitsWriteRepo for MemoryRepo {
    async fn insert_unit(&self, snapshot: UnitSnapshot) -> Result<UnitRecord, RepoError> {
        let mut units = self.units.lock().await;
        let unique_key = snapshot.unique_key();
        if units.iter().any(|unit| unit.unique_key == unique_key) {
            return Err(RepoError::Duplicate {
                constraint: "administrative_units_unique_key".into(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = UnitRecord {
            id: Uuid::new_v4(),
            schema_version: snapshot.schema_version,
            level: snapshot.level,
            code: snapshot.code,
            parent_code: snapshot.parent_code,
            name: snapshot.name,
            english_name: snapshot.english_name,
            administrative_level: snapshot.administrative_level,
            decree: snapshot.decree,
            boundary: snapshot.boundary,
            unique_key,
            is_deleted: snapshot.is_deleted,
            deleted_at: snapshot.is_deleted.then_some(now),
            created_at: now,
            updated_at: now,
        };
        units.push(record.clone());
        Ok(record)
    }

    async fn update_unit(&self, params: UpdateUnitParams) -> Result<UnitRecord, RepoError> {
        let mut units = self.units.lock().await;
        let unit = units
            .iter_mut()
            .find(|unit| unit.id == params.id)
            .ok_or(RepoError::NotFound)?;

        let now = OffsetDateTime::now_utc();
        unit.deleted_at = params
            .snapshot
            .is_deleted
            .then(|| params.deleted_at.unwrap_or(now));
        apply_snapshot(unit, params.snapshot);
        unit.updated_at = now;
        Ok(unit.clone())
    }

    async fn soft_delete_unit(
        &self,
        id: Uuid,
        deleted_at: OffsetDateTime,
    ) -> Result<UnitRecord, RepoError> {
        let mut units = self.units.lock().await;
        let unit = units
            .iter_mut()
            .find(|unit| unit.id == id && !unit.is_deleted)
            .ok_or(RepoError::NotFound)?;
        unit.is_deleted = true;
        unit.deleted_at = Some(deleted_at);
        unit.updated_at = deleted_at;
        Ok(unit.clone())
    }

    async fn purge_deleted(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError> {
        let mut units = self.units.lock().await;
        let before = units.len();
        units.retain(|unit| !(unit.is_deleted && unit.deleted_at.is_some_and(|at| at < cutoff)));
        Ok((before - units.len()) as u64)
    }
}

#[async_trait]
impl HistoryRepo for MemoryRepo {
    async fn append_entry(&self, entry: HistoryEntry) -> Result<(), RepoError> {
        self.history.lock().await.push(entry);
        Ok(())
    }

    async fn list_for_code(&self, code: &str) -> Result<Vec<HistoryEntry>, RepoError> {
        self.check_reads()?;
        Ok(self
            .history
            .lock()
            .await
            .iter()
            .filter(|entry| entry.code == code)
            .cloned()
            .collect())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, RepoError> {
        self.check_reads()?;
        Ok(self
            .history
            .lock()
            .await
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<HistoryEntry>, RepoError> {
        self.check_reads()?;
        Ok(self
            .history
            .lock()
            .await
            .iter()
            .find(|entry| entry.id == id)
            .cloned())
    }
}

/// Health probe with a fixed answer.
pub struct StaticHealth {
    pub healthy: bool,
}

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn check(&self) -> Result<(), sqlx::Error> {
        if self.healthy {
            Ok(())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

/// Scratch fallback files; the directory lives as long as the returned guard.
pub struct FallbackFiles {
    pub dir: TempDir,
    pub store: Arc<JsonFileFallbackStore>,
}

impl FallbackFiles {
    pub fn new(v1: Value, v2: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_json(&dir.path().join("v1.json"), &v1);
        write_json(&dir.path().join("v2.json"), &v2);
        let store = Arc::new(JsonFileFallbackStore::new(
            dir.path().join("v1.json"),
            dir.path().join("v2.json"),
            false,
        ));
        Self { dir, store }
    }

    /// Both files absent: every read fails with an io error.
    pub fn missing() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileFallbackStore::new(
            dir.path().join("v1.json"),
            dir.path().join("v2.json"),
            false,
        ));
        Self { dir, store }
    }

    pub fn empty() -> Self {
        Self::new(Value::Array(Vec::new()), Value::Array(Vec::new()))
    }

    pub fn read(&self, version: SchemaVersion) -> Value {
        let bytes = std::fs::read(self.store.path(version)).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn dyn_store(&self) -> Arc<dyn FallbackStore> {
        self.store.clone()
    }
}

pub fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

pub fn api_state(repo: &Arc<MemoryRepo>, fallback: &FallbackFiles) -> ApiState {
    ApiState::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        fallback.dyn_store(),
        Arc::new(StaticHealth { healthy: true }),
    )
}
