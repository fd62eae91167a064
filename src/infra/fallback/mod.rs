//! JSON-file implementation of the fallback store.
//!
//! v1 is re-read on every call. v2 may be kept in a [`FallbackCache`] that is
//! dropped whenever this process rewrites the file or `invalidate` is called.
//! Writes read the whole file, modify it and write it back with no locking;
//! concurrent writers can lose each other's changes.

mod adapter;

pub use adapter::{document_from_value, document_to_value};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::{debug, info};

use crate::application::fallback::{
    FallbackDocument, FallbackError, FallbackNode, FallbackStore, Placement,
};
use crate::config::FallbackSettings;
use crate::domain::units::{SchemaVersion, UnitLevel};

/// Explicitly managed in-memory copy of one fallback document.
#[derive(Debug, Default)]
pub struct FallbackCache {
    slot: RwLock<Option<Arc<FallbackDocument>>>,
}

impl FallbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<FallbackDocument>, FallbackError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FallbackDocument, FallbackError>>,
    {
        if let Some(doc) = self.slot.read().await.as_ref() {
            return Ok(Arc::clone(doc));
        }

        let mut slot = self.slot.write().await;
        if let Some(doc) = slot.as_ref() {
            return Ok(Arc::clone(doc));
        }
        let doc = Arc::new(load().await?);
        *slot = Some(Arc::clone(&doc));
        Ok(doc)
    }

    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.read().await.is_some()
    }
}

#[derive(Debug)]
pub struct JsonFileFallbackStore {
    v1_path: PathBuf,
    v2_path: PathBuf,
    v2_cache: Option<FallbackCache>,
}

impl JsonFileFallbackStore {
    pub fn new(v1_path: impl Into<PathBuf>, v2_path: impl Into<PathBuf>, cache_v2: bool) -> Self {
        Self {
            v1_path: v1_path.into(),
            v2_path: v2_path.into(),
            v2_cache: cache_v2.then(FallbackCache::new),
        }
    }

    pub fn from_settings(settings: &FallbackSettings) -> Self {
        Self::new(
            settings.v1_path.clone(),
            settings.v2_path.clone(),
            settings.cache_v2,
        )
    }

    pub fn path(&self, version: SchemaVersion) -> &Path {
        match version {
            SchemaVersion::V1 => &self.v1_path,
            SchemaVersion::V2 => &self.v2_path,
        }
    }

    fn cache(&self, version: SchemaVersion) -> Option<&FallbackCache> {
        match version {
            SchemaVersion::V1 => None,
            SchemaVersion::V2 => self.v2_cache.as_ref(),
        }
    }

    async fn read_document(&self, version: SchemaVersion) -> Result<FallbackDocument, FallbackError> {
        let path = self.path(version);
        let location = path.display().to_string();

        let bytes = fs::read(path).await.map_err(|err| FallbackError::Io {
            path: location.clone(),
            message: err.to_string(),
        })?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|err| FallbackError::Parse {
                path: location.clone(),
                message: err.to_string(),
            })?;
        let doc = document_from_value(version, value).ok_or_else(|| FallbackError::Parse {
            path: location.clone(),
            message: "expected an array of provinces".to_string(),
        })?;

        debug!(
            target = "dvhc::fallback",
            path = %location,
            provinces = doc.provinces.len(),
            "fallback document loaded"
        );
        Ok(doc)
    }

    async fn write_document(
        &self,
        version: SchemaVersion,
        doc: &FallbackDocument,
    ) -> Result<(), FallbackError> {
        let path = self.path(version);
        let location = path.display().to_string();
        let io_error = |err: std::io::Error| FallbackError::Io {
            path: location.clone(),
            message: err.to_string(),
        };

        let bytes = serde_json::to_vec_pretty(&document_to_value(version, doc)).map_err(|err| {
            FallbackError::Encode {
                path: location.clone(),
                message: err.to_string(),
            }
        })?;

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, bytes).await.map_err(io_error)?;
        fs::rename(&staging, path).await.map_err(io_error)?;

        if let Some(cache) = self.cache(version) {
            cache.invalidate().await;
        }
        Ok(())
    }
}

#[async_trait]
impl FallbackStore for JsonFileFallbackStore {
    async fn load(&self, version: SchemaVersion) -> Result<Arc<FallbackDocument>, FallbackError> {
        match self.cache(version) {
            Some(cache) => cache.get_or_load(|| self.read_document(version)).await,
            None => self.read_document(version).await.map(Arc::new),
        }
    }

    async fn remove_unit(
        &self,
        version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<bool, FallbackError> {
        let mut doc = self.read_document(version).await?;
        if !doc.remove_node(level, code) {
            return Ok(false);
        }
        self.write_document(version, &doc).await?;
        info!(
            target = "dvhc::fallback",
            schema_version = %version,
            level = %level,
            code,
            "unit removed from fallback store"
        );
        Ok(true)
    }

    async fn insert_unit(
        &self,
        version: SchemaVersion,
        province_code: &str,
        parent_code: Option<&str>,
        node: FallbackNode,
    ) -> Result<Placement, FallbackError> {
        let mut doc = self.read_document(version).await?;
        let code = node.code.clone();
        if doc.locate(node.level, &code).is_some() {
            return Ok(Placement::AlreadyPresent);
        }
        let placement = doc.insert_under(province_code, parent_code, node);
        if placement != Placement::Inserted {
            return Ok(placement);
        }
        self.write_document(version, &doc).await?;
        info!(
            target = "dvhc::fallback",
            schema_version = %version,
            code = %code,
            province_code,
            "unit re-inserted into fallback store"
        );
        Ok(Placement::Inserted)
    }

    async fn invalidate(&self, version: SchemaVersion) {
        if let Some(cache) = self.cache(version) {
            cache.invalidate().await;
        }
    }
}
