//! Repository-first lookups with a file-backed fallback.
//!
//! The fallback document is consulted when the repository errors or yields
//! nothing. An empty repository and a repository without data for the request
//! are indistinguishable here, so both fall back. Failures reading the fallback
//! file itself propagate to the caller.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::fallback::{FallbackDocument, FallbackError, FallbackStore, LocatedNode};
use crate::application::repos::{RepoError, UnitQuery, UnitsRepo};
use crate::domain::normalize::name_matches;
use crate::domain::units::{SchemaVersion, UnitLevel, UnitRecord};

/// Upper bound on parent hops; the deepest hierarchy has three tiers.
const MAX_PARENT_HOPS: usize = 4;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Fallback(#[from] FallbackError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Repository,
    Fallback,
}

/// Flat unit shape returned by read endpoints regardless of where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub schema_version: SchemaVersion,
    pub level: UnitLevel,
    pub code: String,
    pub parent_code: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrative_level: Option<String>,
}

impl From<&UnitRecord> for UnitView {
    fn from(unit: &UnitRecord) -> Self {
        Self {
            schema_version: unit.schema_version,
            level: unit.level,
            code: unit.code.clone(),
            parent_code: unit.parent().map(str::to_string),
            name: unit.name.clone(),
            english_name: unit.english_name.clone(),
            administrative_level: unit.administrative_level.clone(),
        }
    }
}

impl UnitView {
    fn from_located(version: SchemaVersion, located: &LocatedNode<'_>) -> Self {
        Self {
            schema_version: version,
            level: located.node.level,
            code: located.node.code.clone(),
            parent_code: located.parent_code().map(str::to_string),
            name: located.node.name.clone(),
            english_name: located.node.english_name.clone(),
            administrative_level: located.node.administrative_level.clone(),
        }
    }
}

/// A unit together with the chain of ancestors up to its province.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ancestry {
    pub province: UnitView,
    pub district: Option<UnitView>,
    pub unit: UnitView,
    pub source: Source,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    pub province: Option<String>,
    pub commune: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressConversion {
    pub original: String,
    pub matched: MatchedPair,
    pub codes: MatchedPair,
    pub found: bool,
}

impl AddressConversion {
    fn new(original: &str, province: Option<&UnitView>, commune: Option<&UnitView>) -> Self {
        Self {
            original: original.to_string(),
            matched: MatchedPair {
                province: province.map(|unit| unit.name.clone()),
                commune: commune.map(|unit| unit.name.clone()),
            },
            codes: MatchedPair {
                province: province.map(|unit| unit.code.clone()),
                commune: commune.map(|unit| unit.code.clone()),
            },
            found: province.is_some() && commune.is_some(),
        }
    }

    fn matched_province(&self) -> bool {
        self.codes.province.is_some()
    }
}

/// Split `"Province, Commune"` (or `"Province, District, Commune"`) into the
/// province and commune fragments. The middle part never takes part in matching.
pub fn parse_address(address: &str) -> Result<(String, String), ResolveError> {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    match (parts.first(), parts.last()) {
        (Some(province), Some(commune)) if parts.len() >= 2 => {
            Ok((province.to_string(), commune.to_string()))
        }
        _ => Err(ResolveError::Validation(
            "Địa chỉ phải có dạng \"Tỉnh/Thành phố, Phường/Xã\"".to_string(),
        )),
    }
}

/// Follow `parent_code` links until a province is reached.
///
/// Returns the chain `[start, ..., province]`, or `None` when a link is broken.
/// Works for both hierarchy generations since it never assumes a fixed depth.
pub async fn walk_to_province(
    units: &dyn UnitsRepo,
    start: UnitRecord,
) -> Result<Option<Vec<UnitRecord>>, RepoError> {
    let version = start.schema_version;
    let mut chain = vec![start];

    for _ in 0..MAX_PARENT_HOPS {
        let Some(current) = chain.last() else {
            break;
        };
        if current.level == UnitLevel::Province {
            return Ok(Some(chain));
        }
        let Some(parent_code) = current.parent().map(str::to_string) else {
            return Ok(None);
        };
        let rank = current.level.rank();

        let candidates = units
            .list_units(
                &UnitQuery::active(version)
                    .code(parent_code)
                    .level(UnitLevel::Province)
                    .level(UnitLevel::District),
            )
            .await?;

        // Prefer the closest tier above the current unit.
        let parent = candidates
            .into_iter()
            .filter(|candidate| candidate.level.rank() < rank)
            .max_by_key(|candidate| candidate.level.rank());

        match parent {
            Some(parent) => chain.push(parent),
            None => return Ok(None),
        }
    }

    Ok(chain
        .last()
        .is_some_and(|unit| unit.level == UnitLevel::Province)
        .then_some(chain))
}

#[derive(Clone)]
pub struct UnitResolver {
    units: Arc<dyn UnitsRepo>,
    fallback: Arc<dyn FallbackStore>,
}

impl UnitResolver {
    pub fn new(units: Arc<dyn UnitsRepo>, fallback: Arc<dyn FallbackStore>) -> Self {
        Self { units, fallback }
    }

    pub async fn list_provinces(
        &self,
        version: SchemaVersion,
    ) -> Result<Vec<UnitView>, ResolveError> {
        let query = UnitQuery::active(version).level(UnitLevel::Province);
        if let Some(units) = self.repo_rows("list_provinces", &query).await {
            return Ok(units.iter().map(UnitView::from).collect());
        }

        let doc = self.fallback.load(version).await?;
        Ok(doc
            .provinces
            .iter()
            .map(|province| {
                UnitView::from_located(
                    version,
                    &LocatedNode {
                        province,
                        district: None,
                        node: province,
                    },
                )
            })
            .collect())
    }

    pub async fn list_districts(
        &self,
        version: SchemaVersion,
        province_code: Option<&str>,
    ) -> Result<Vec<UnitView>, ResolveError> {
        let mut query = UnitQuery::active(version).level(UnitLevel::District);
        if let Some(code) = province_code {
            query = query.parent(code);
        }
        if let Some(units) = self.repo_rows("list_districts", &query).await {
            return Ok(units.iter().map(UnitView::from).collect());
        }

        let doc = self.fallback.load(version).await?;
        let districts = doc
            .provinces
            .iter()
            .filter(|province| province_code.is_none_or(|code| province.code == code))
            .flat_map(|province| {
                doc.districts_of(province).map(move |node| LocatedNode {
                    province,
                    district: None,
                    node,
                })
            })
            .map(|located| UnitView::from_located(version, &located))
            .collect();
        Ok(districts)
    }

    /// Communes under a province (directly or via districts), a single commune
    /// when `id` is a commune code, or every commune when `id` is absent.
    pub async fn list_communes(
        &self,
        version: SchemaVersion,
        id: Option<&str>,
    ) -> Result<Vec<UnitView>, ResolveError> {
        let from_repo = match self.communes_from_repo(version, id).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    target = "dvhc::resolver",
                    operation = "list_communes",
                    schema_version = %version,
                    error = %err,
                    "repository lookup failed; using fallback store"
                );
                None
            }
        };

        if let Some(units) = from_repo.as_ref().filter(|units| !units.is_empty()) {
            return Ok(units.clone());
        }

        debug!(
            target = "dvhc::resolver",
            operation = "list_communes",
            schema_version = %version,
            id = id.unwrap_or(""),
            "repository returned no communes; using fallback store"
        );

        let doc = self.fallback.load(version).await?;
        match (communes_from_document(&doc, version, id), from_repo) {
            (Some(units), _) => Ok(units),
            (None, Some(empty)) => Ok(empty),
            (None, None) => Err(ResolveError::NotFound(
                "Không tìm thấy tỉnh hoặc xã/phường".to_string(),
            )),
        }
    }

    /// Locate a single unit, repository first.
    pub async fn find_unit(
        &self,
        version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<Option<(UnitView, Source)>, ResolveError> {
        let query = UnitQuery::active(version).level(level).code(code);
        if let Some(units) = self.repo_rows("find_unit", &query).await {
            return Ok(units
                .first()
                .map(|unit| (UnitView::from(unit), Source::Repository)));
        }

        let doc = self.fallback.load(version).await?;
        Ok(doc
            .locate(level, code)
            .map(|located| (UnitView::from_located(version, &located), Source::Fallback)))
    }

    /// Resolve `code` at `level` together with its ancestors.
    ///
    /// A repository chain that does not reach a province counts as a miss.
    pub async fn ancestry(
        &self,
        version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<Option<Ancestry>, ResolveError> {
        match self.ancestry_from_repo(version, level, code).await {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => {}
            Err(err) => warn!(
                target = "dvhc::resolver",
                operation = "ancestry",
                schema_version = %version,
                code,
                error = %err,
                "repository lookup failed; using fallback store"
            ),
        }

        let doc = self.fallback.load(version).await?;
        Ok(doc.locate(level, code).map(|located| Ancestry {
            province: UnitView::from_located(
                version,
                &LocatedNode {
                    province: located.province,
                    district: None,
                    node: located.province,
                },
            ),
            district: located.district.map(|district| {
                UnitView::from_located(
                    version,
                    &LocatedNode {
                        province: located.province,
                        district: None,
                        node: district,
                    },
                )
            }),
            unit: UnitView::from_located(version, &located),
            source: Source::Fallback,
        }))
    }

    /// Match a free-text `"Province, Commune"` address against stored names.
    ///
    /// The first province whose normalized name contains the province fragment
    /// wins, then the first of its communes matching the commune fragment. No
    /// ranking is performed.
    pub async fn convert_address(
        &self,
        version: SchemaVersion,
        address: &str,
    ) -> Result<AddressConversion, ResolveError> {
        let (province_part, commune_part) = parse_address(address)?;

        let from_repo = match self
            .convert_from_repo(version, address, &province_part, &commune_part)
            .await
        {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(
                    target = "dvhc::resolver",
                    operation = "convert_address",
                    schema_version = %version,
                    error = %err,
                    "repository lookup failed; using fallback store"
                );
                None
            }
        };

        if let Some(result) = from_repo.as_ref().filter(|result| result.found) {
            return Ok(result.clone());
        }

        let doc = self.fallback.load(version).await?;
        let from_file =
            convert_from_document(&doc, version, address, &province_part, &commune_part);

        Ok(match from_repo {
            Some(partial) if !from_file.found && partial.matched_province() => partial,
            _ => from_file,
        })
    }

    async fn repo_rows(&self, operation: &'static str, query: &UnitQuery) -> Option<Vec<UnitRecord>> {
        match self.units.list_units(query).await {
            Ok(units) if !units.is_empty() => Some(units),
            Ok(_) => {
                debug!(
                    target = "dvhc::resolver",
                    operation,
                    "repository returned no rows; using fallback store"
                );
                None
            }
            Err(err) => {
                warn!(
                    target = "dvhc::resolver",
                    operation,
                    error = %err,
                    "repository lookup failed; using fallback store"
                );
                None
            }
        }
    }

    /// `None` when `id` names neither a province nor a commune.
    async fn communes_from_repo(
        &self,
        version: SchemaVersion,
        id: Option<&str>,
    ) -> Result<Option<Vec<UnitView>>, RepoError> {
        let Some(id) = id else {
            let provinces = self
                .units
                .list_units(&UnitQuery::active(version).level(UnitLevel::Province))
                .await?;
            let mut all = Vec::new();
            for province in &provinces {
                all.extend(self.repo_communes_of(version, &province.code, true).await?);
            }
            return Ok(Some(all));
        };

        let province = self
            .units
            .list_units(
                &UnitQuery::active(version)
                    .level(UnitLevel::Province)
                    .code(id),
            )
            .await?;
        if !province.is_empty() {
            return self.repo_communes_of(version, id, false).await.map(Some);
        }

        let commune = self
            .units
            .list_units(&UnitQuery::active(version).level(UnitLevel::Commune).code(id))
            .await?;
        Ok(commune
            .first()
            .map(|unit| vec![UnitView::from(unit)]))
    }

    /// Direct communes of a province; districts are consulted when there are none,
    /// or always when `include_both` is set.
    async fn repo_communes_of(
        &self,
        version: SchemaVersion,
        province_code: &str,
        include_both: bool,
    ) -> Result<Vec<UnitView>, RepoError> {
        let mut communes: Vec<UnitView> = self
            .units
            .list_units(
                &UnitQuery::active(version)
                    .level(UnitLevel::Commune)
                    .parent(province_code),
            )
            .await?
            .iter()
            .map(UnitView::from)
            .collect();

        if !communes.is_empty() && !include_both {
            return Ok(communes);
        }

        let districts = self
            .units
            .list_units(
                &UnitQuery::active(version)
                    .level(UnitLevel::District)
                    .parent(province_code),
            )
            .await?;
        if districts.is_empty() {
            return Ok(communes);
        }

        let via_districts = self
            .units
            .list_units(
                &UnitQuery::active(version)
                    .level(UnitLevel::Commune)
                    .parents(districts.iter().map(|district| district.code.clone())),
            )
            .await?;
        communes.extend(via_districts.iter().map(UnitView::from));
        Ok(communes)
    }

    async fn ancestry_from_repo(
        &self,
        version: SchemaVersion,
        level: UnitLevel,
        code: &str,
    ) -> Result<Option<Ancestry>, RepoError> {
        let found = self
            .units
            .list_units(&UnitQuery::active(version).level(level).code(code))
            .await?;
        let Some(unit) = found.into_iter().next() else {
            return Ok(None);
        };
        let Some(chain) = walk_to_province(self.units.as_ref(), unit).await? else {
            return Ok(None);
        };

        let views: Vec<UnitView> = chain.iter().map(UnitView::from).collect();
        let (Some(unit), Some(province)) = (views.first(), views.last()) else {
            return Ok(None);
        };
        let district = views
            .iter()
            .find(|view| view.level == UnitLevel::District && view.code != unit.code)
            .cloned();

        Ok(Some(Ancestry {
            province: province.clone(),
            district,
            unit: unit.clone(),
            source: Source::Repository,
        }))
    }

    async fn convert_from_repo(
        &self,
        version: SchemaVersion,
        address: &str,
        province_part: &str,
        commune_part: &str,
    ) -> Result<AddressConversion, RepoError> {
        let provinces = self
            .units
            .list_units(&UnitQuery::active(version).level(UnitLevel::Province))
            .await?;
        let Some(province) = provinces
            .iter()
            .find(|province| name_matches(&province.name, province_part))
        else {
            return Ok(AddressConversion::new(address, None, None));
        };

        let province = UnitView::from(province);
        let communes = self
            .repo_communes_of(version, &province.code, true)
            .await?;
        let commune = communes
            .iter()
            .find(|commune| name_matches(&commune.name, commune_part));

        Ok(AddressConversion::new(address, Some(&province), commune))
    }
}

fn communes_from_document(
    doc: &FallbackDocument,
    version: SchemaVersion,
    id: Option<&str>,
) -> Option<Vec<UnitView>> {
    let Some(id) = id else {
        return Some(
            doc.all_communes()
                .iter()
                .map(|located| UnitView::from_located(version, located))
                .collect(),
        );
    };

    if let Some(province) = doc.province(id) {
        return Some(
            doc.communes_of(province)
                .iter()
                .map(|located| UnitView::from_located(version, located))
                .collect(),
        );
    }

    doc.locate(UnitLevel::Commune, id)
        .map(|located| vec![UnitView::from_located(version, &located)])
}

fn convert_from_document(
    doc: &FallbackDocument,
    version: SchemaVersion,
    address: &str,
    province_part: &str,
    commune_part: &str,
) -> AddressConversion {
    let Some(province) = doc
        .provinces
        .iter()
        .find(|province| name_matches(&province.name, province_part))
    else {
        return AddressConversion::new(address, None, None);
    };

    let commune = doc
        .communes_of(province)
        .into_iter()
        .find(|located| name_matches(&located.node.name, commune_part))
        .map(|located| UnitView::from_located(version, &located));
    let province = UnitView::from_located(
        version,
        &LocatedNode {
            province,
            district: None,
            node: province,
        },
    );

    AddressConversion::new(address, Some(&province), commune.as_ref())
}
