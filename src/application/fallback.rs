//! Secondary, file-resident view of the administrative hierarchy.
//!
//! Adapters normalise whatever child-array spelling the source file uses
//! (`districts`, `communes`, `wards`, `children`) into [`FallbackNode`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::units::{SchemaVersion, UnitLevel};

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("fallback store io error at `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("fallback store `{path}` is not valid JSON: {message}")]
    Parse { path: String, message: String },
    #[error("fallback store `{path}` could not be encoded: {message}")]
    Encode { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackNode {
    pub code: String,
    pub name: String,
    pub level: UnitLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_level: Option<String>,
    #[serde(default)]
    pub children: Vec<FallbackNode>,
}

/// A node located inside the document together with its ancestors.
#[derive(Debug, Clone, Copy)]
pub struct LocatedNode<'a> {
    pub province: &'a FallbackNode,
    pub district: Option<&'a FallbackNode>,
    pub node: &'a FallbackNode,
}

impl LocatedNode<'_> {
    pub fn parent_code(&self) -> Option<&str> {
        if self.node.level == UnitLevel::Province {
            return None;
        }
        match self.district {
            Some(district) if district.code != self.node.code => Some(district.code.as_str()),
            _ => Some(self.province.code.as_str()),
        }
    }
}

/// Outcome of putting a node back into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inserted,
    AlreadyPresent,
    /// Neither the recorded province nor the recorded district is in the file.
    ParentMissing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackDocument {
    pub provinces: Vec<FallbackNode>,
}

impl FallbackDocument {
    pub fn new(provinces: Vec<FallbackNode>) -> Self {
        Self { provinces }
    }

    pub fn province(&self, code: &str) -> Option<&FallbackNode> {
        self.provinces.iter().find(|province| province.code == code)
    }

    pub fn districts_of<'a>(
        &'a self,
        province: &'a FallbackNode,
    ) -> impl Iterator<Item = &'a FallbackNode> + 'a {
        province
            .children
            .iter()
            .filter(|child| child.level == UnitLevel::District)
    }

    /// Communes attached directly to the province followed by those reached via districts.
    pub fn communes_of<'a>(&'a self, province: &'a FallbackNode) -> Vec<LocatedNode<'a>> {
        let mut direct: Vec<LocatedNode<'a>> = province
            .children
            .iter()
            .filter(|child| child.level == UnitLevel::Commune)
            .map(|node| LocatedNode {
                province,
                district: None,
                node,
            })
            .collect();

        for district in self.districts_of(province) {
            direct.extend(
                district
                    .children
                    .iter()
                    .filter(|child| child.level == UnitLevel::Commune)
                    .map(|node| LocatedNode {
                        province,
                        district: Some(district),
                        node,
                    }),
            );
        }

        direct
    }

    pub fn all_communes(&self) -> Vec<LocatedNode<'_>> {
        self.provinces
            .iter()
            .flat_map(|province| self.communes_of(province))
            .collect()
    }

    /// First node with `code` at `level`, searched province by province.
    pub fn locate(&self, level: UnitLevel, code: &str) -> Option<LocatedNode<'_>> {
        for province in &self.provinces {
            if level == UnitLevel::Province && province.code == code {
                return Some(LocatedNode {
                    province,
                    district: None,
                    node: province,
                });
            }
            for child in &province.children {
                if child.level == level && child.code == code {
                    return Some(LocatedNode {
                        province,
                        district: None,
                        node: child,
                    });
                }
                if child.level != UnitLevel::District {
                    continue;
                }
                if let Some(node) = child
                    .children
                    .iter()
                    .find(|grandchild| grandchild.level == level && grandchild.code == code)
                {
                    return Some(LocatedNode {
                        province,
                        district: Some(child),
                        node,
                    });
                }
            }
        }
        None
    }

    /// Remove the nodes carrying `code` at `level`, wherever they sit.
    /// Same-coded nodes at other levels are left alone. Returns whether
    /// anything changed.
    pub fn remove_node(&mut self, level: UnitLevel, code: &str) -> bool {
        fn prune(nodes: &mut Vec<FallbackNode>, level: UnitLevel, code: &str) -> bool {
            let before = nodes.len();
            nodes.retain(|node| !(node.level == level && node.code == code));
            let mut changed = nodes.len() != before;
            for node in nodes.iter_mut() {
                changed |= prune(&mut node.children, level, code);
            }
            changed
        }

        prune(&mut self.provinces, level, code)
    }

    /// Insert `node` under `parent_code` (a province, or a district of `province_code`).
    ///
    /// The document is untouched unless the result is [`Placement::Inserted`].
    pub fn insert_under(
        &mut self,
        province_code: &str,
        parent_code: Option<&str>,
        node: FallbackNode,
    ) -> Placement {
        if node.level == UnitLevel::Province {
            if self.provinces.iter().any(|existing| existing.code == node.code) {
                return Placement::AlreadyPresent;
            }
            self.provinces.push(node);
            return Placement::Inserted;
        }

        let Some(province) = self
            .provinces
            .iter_mut()
            .find(|province| province.code == province_code)
        else {
            return Placement::ParentMissing;
        };

        let parent = match parent_code {
            Some(code) if code != province.code => {
                match province.children.iter_mut().find(|child| {
                    child.level == UnitLevel::District && child.code == code
                }) {
                    Some(district) => district,
                    None => return Placement::ParentMissing,
                }
            }
            _ => province,
        };

        if parent
            .children
            .iter()
            .any(|child| child.code == node.code && child.level == node.level)
        {
            return Placement::AlreadyPresent;
        }
        parent.children.push(node);
        Placement::Inserted
    }
}

#[async_trait]
pub trait FallbackStore: Send + Sync {
    /// Load the document for `version`. A missing or malformed file is an error.
    async fn load(&self, version: SchemaVersion) -> Result<Arc<FallbackDocument>, FallbackError>;

    /// Remove the nodes carrying `code` at `level`; returns whether the file changed.
    async fn remove_unit(
        &self,
        version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<bool, FallbackError>;

    /// Insert `node` under its recorded parent, skipping duplicates.
    async fn insert_unit(
        &self,
        version: SchemaVersion,
        province_code: &str,
        parent_code: Option<&str>,
        node: FallbackNode,
    ) -> Result<Placement, FallbackError>;

    /// Drop any cached copy so the next load re-reads the file.
    async fn invalidate(&self, version: SchemaVersion);
}
