//! Maps a commune code onto both hierarchy generations.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::application::fallback::FallbackError;
use crate::application::resolver::{Ancestry, ResolveError, Source, UnitResolver, UnitView};
use crate::domain::units::{SchemaVersion, UnitLevel};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Fallback(#[from] FallbackError),
}

impl From<ResolveError> for BridgeError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Validation(message) => BridgeError::Validation(message),
            ResolveError::NotFound(message) => BridgeError::NotFound(message),
            ResolveError::Fallback(err) => BridgeError::Fallback(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCode {
    pub code: String,
    pub name: String,
}

impl From<&UnitView> for NamedCode {
    fn from(unit: &UnitView) -> Self {
        Self {
            code: unit.code.clone(),
            name: unit.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyMapping {
    pub province: NamedCode,
    pub district: Option<NamedCode>,
    pub commune: NamedCode,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReformedMapping {
    pub province: NamedCode,
    pub commune: NamedCode,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeMapping {
    pub code: String,
    pub v1: Option<LegacyMapping>,
    pub v2: Option<ReformedMapping>,
}

#[derive(Clone)]
pub struct BridgeService {
    resolver: UnitResolver,
}

impl BridgeService {
    pub fn new(resolver: UnitResolver) -> Self {
        Self { resolver }
    }

    /// Resolve `code` under both generations concurrently.
    ///
    /// A code known to only one generation is a partial success; a code known
    /// to neither is `NotFound`.
    pub async fn map_code(&self, code: &str) -> Result<CodeMapping, BridgeError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BridgeError::Validation("code là bắt buộc".to_string()));
        }

        let (legacy, reformed) = tokio::try_join!(
            self.resolver
                .ancestry(SchemaVersion::V1, UnitLevel::Commune, code),
            self.resolver
                .ancestry(SchemaVersion::V2, UnitLevel::Commune, code),
        )?;

        let v1 = legacy.map(|found: Ancestry| LegacyMapping {
            province: NamedCode::from(&found.province),
            district: found.district.as_ref().map(NamedCode::from),
            commune: NamedCode::from(&found.unit),
            source: found.source,
        });
        let v2 = reformed.map(|found: Ancestry| ReformedMapping {
            province: NamedCode::from(&found.province),
            commune: NamedCode::from(&found.unit),
            source: found.source,
        });

        if v1.is_none() && v2.is_none() {
            return Err(BridgeError::NotFound(format!(
                "Không tìm thấy xã/phường với mã {code} ở cả v1 và v2"
            )));
        }

        debug!(
            target = "dvhc::bridge",
            code,
            v1 = v1.is_some(),
            v2 = v2.is_some(),
            "code mapped"
        );
        Ok(CodeMapping {
            code: code.to_string(),
            v1,
            v2,
        })
    }
}
