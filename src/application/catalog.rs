//! Repository-only reads behind `/units`: search and hierarchy trees.

use std::sync::Arc;

use crate::application::repos::{DeletedScope, RepoError, UnitQuery, UnitsRepo};
use crate::domain::tree::{TreeNode, build_tree};
use crate::domain::units::{SchemaVersion, UnitLevel, UnitRecord};

pub const DEFAULT_SEARCH_LIMIT: u32 = 500;
pub const MAX_SEARCH_LIMIT: u32 = 2000;

#[derive(Debug, Clone, Default)]
pub struct UnitSearch {
    pub search: Option<String>,
    pub schema_version: Option<SchemaVersion>,
    pub level: Option<UnitLevel>,
    pub parent_code: Option<String>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
}

impl UnitSearch {
    fn into_query(self) -> UnitQuery {
        UnitQuery {
            schema_version: self.schema_version,
            levels: self.level.into_iter().collect(),
            code: None,
            parent_codes: self.parent_code.into_iter().collect(),
            search: self
                .search
                .map(|term| term.trim().to_string())
                .filter(|term| !term.is_empty()),
            deleted: if self.include_deleted {
                DeletedScope::All
            } else {
                DeletedScope::Active
            },
            limit: Some(
                self.limit
                    .unwrap_or(DEFAULT_SEARCH_LIMIT)
                    .clamp(1, MAX_SEARCH_LIMIT),
            ),
        }
    }
}

#[derive(Clone)]
pub struct UnitCatalogService {
    units: Arc<dyn UnitsRepo>,
}

impl UnitCatalogService {
    pub fn new(units: Arc<dyn UnitsRepo>) -> Self {
        Self { units }
    }

    pub async fn search(&self, search: UnitSearch) -> Result<Vec<UnitRecord>, RepoError> {
        self.units.list_units(&search.into_query()).await
    }

    pub async fn find(&self, id: uuid::Uuid) -> Result<Option<UnitRecord>, RepoError> {
        self.units.find_by_id(id).await
    }

    /// Active units of `version` at or above `deepest`, arranged by parent code.
    pub async fn tree(
        &self,
        version: SchemaVersion,
        deepest: Option<UnitLevel>,
    ) -> Result<Vec<TreeNode<UnitRecord>>, RepoError> {
        let deepest = deepest.unwrap_or(UnitLevel::Commune);
        let mut query = UnitQuery::active(version);
        query.levels = [UnitLevel::Province, UnitLevel::District, UnitLevel::Commune]
            .into_iter()
            .filter(|level| level.rank() <= deepest.rank())
            .collect();

        let units = self.units.list_units(&query).await?;
        Ok(build_tree(units))
    }
}
