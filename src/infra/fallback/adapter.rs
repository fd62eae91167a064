//! Conversion between the on-disk fallback layout and [`FallbackNode`].
//!
//! Files in the wild spell child arrays as `districts`, `communes`, `wards` or
//! `children`, and sometimes wrap the province array in an object. Everything
//! is folded into the canonical node shape here; nothing else in the crate looks
//! at the raw JSON.

use serde_json::{Map, Value, json};

use crate::application::fallback::{FallbackDocument, FallbackNode};
use crate::domain::units::{SchemaVersion, UnitLevel};

const DISTRICT_KEYS: &[&str] = &["districts"];
const COMMUNE_KEYS: &[&str] = &["communes", "wards"];
const GENERIC_KEY: &str = "children";
const WRAPPER_KEYS: &[&str] = &["provinces", "data"];

/// Read a parsed fallback file into the canonical document.
///
/// Returns `None` when the top level is neither an array nor an object wrapping
/// one. Entries without a usable `code` are skipped.
pub fn document_from_value(version: SchemaVersion, value: Value) -> Option<FallbackDocument> {
    let provinces = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })?,
        _ => return None,
    };

    let provinces = provinces
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|object| node_from_object(version, UnitLevel::Province, object))
        .collect();
    Some(FallbackDocument::new(provinces))
}

/// Render the document in the per-version file layout: v1 provinces carry
/// `districts` (with nested `communes`) plus any direct `communes`, v2 provinces
/// carry `wards`.
pub fn document_to_value(version: SchemaVersion, doc: &FallbackDocument) -> Value {
    Value::Array(
        doc.provinces
            .iter()
            .map(|province| node_to_value(version, province))
            .collect(),
    )
}

fn node_from_object(
    version: SchemaVersion,
    level: UnitLevel,
    object: &Map<String, Value>,
) -> Option<FallbackNode> {
    let code = scalar_text(object.get("code")?)?;
    let name = object
        .get("name")
        .and_then(scalar_text)
        .unwrap_or_default();

    let mut children = Vec::new();
    if level == UnitLevel::Province {
        children.extend(child_nodes(version, object, DISTRICT_KEYS, |_| UnitLevel::District));
    }
    if level != UnitLevel::Commune {
        children.extend(child_nodes(version, object, COMMUNE_KEYS, |_| UnitLevel::Commune));
        children.extend(child_nodes(version, object, &[GENERIC_KEY], |child| {
            generic_child_level(version, level, child)
        }));
    }

    Some(FallbackNode {
        code,
        name,
        level,
        english_name: text_field(object, &["englishName", "english_name", "nameEn"]),
        administrative_level: text_field(
            object,
            &["administrativeLevel", "administrative_level", "type"],
        ),
        children,
    })
}

fn child_nodes(
    version: SchemaVersion,
    object: &Map<String, Value>,
    keys: &[&str],
    level_of: impl Fn(&Map<String, Value>) -> UnitLevel,
) -> Vec<FallbackNode> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
        .filter_map(|child| node_from_object(version, level_of(child), child))
        .collect()
}

/// Level of an entry found under the generic `children` key.
fn generic_child_level(
    version: SchemaVersion,
    parent: UnitLevel,
    child: &Map<String, Value>,
) -> UnitLevel {
    if let Some(level) = child
        .get("level")
        .and_then(Value::as_str)
        .and_then(|value| value.parse::<UnitLevel>().ok())
        .filter(|level| level.rank() > parent.rank())
    {
        return level;
    }

    let nesting_keys: [&[&str]; 3] = [DISTRICT_KEYS, COMMUNE_KEYS, &[GENERIC_KEY]];
    let nests_further = nesting_keys
        .iter()
        .flat_map(|keys| keys.iter())
        .any(|key| child.get(*key).and_then(Value::as_array).is_some_and(|a| !a.is_empty()));

    if version == SchemaVersion::V1 && parent == UnitLevel::Province && nests_further {
        UnitLevel::District
    } else {
        UnitLevel::Commune
    }
}

fn node_to_value(version: SchemaVersion, node: &FallbackNode) -> Value {
    let mut object = Map::new();
    object.insert("code".into(), json!(node.code));
    object.insert("name".into(), json!(node.name));
    if let Some(english_name) = node.english_name.as_ref() {
        object.insert("englishName".into(), json!(english_name));
    }
    if let Some(administrative_level) = node.administrative_level.as_ref() {
        object.insert("administrativeLevel".into(), json!(administrative_level));
    }

    let of_level = |level: UnitLevel| -> Vec<Value> {
        node.children
            .iter()
            .filter(|child| child.level == level)
            .map(|child| node_to_value(version, child))
            .collect()
    };

    match (version, node.level) {
        (_, UnitLevel::Commune) => {}
        (SchemaVersion::V1, UnitLevel::Province) => {
            let districts = of_level(UnitLevel::District);
            if !districts.is_empty() {
                object.insert("districts".into(), Value::Array(districts));
            }
            let communes = of_level(UnitLevel::Commune);
            if !communes.is_empty() {
                object.insert("communes".into(), Value::Array(communes));
            }
        }
        (SchemaVersion::V1, UnitLevel::District) => {
            object.insert("communes".into(), Value::Array(of_level(UnitLevel::Commune)));
        }
        (SchemaVersion::V2, _) => {
            object.insert("wards".into(), Value::Array(of_level(UnitLevel::Commune)));
        }
    }

    Value::Object(object)
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(scalar_text))
        .filter(|value| !value.is_empty())
}

/// Codes are sometimes stored as numbers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_layout_nests_districts_and_communes() {
        let doc = document_from_value(
            SchemaVersion::V1,
            json!([{
                "code": "01",
                "name": "Thành phố Hà Nội",
                "districts": [{
                    "code": "001",
                    "name": "Quận Ba Đình",
                    "communes": [{ "code": "00001", "name": "Phường Phúc Xá" }]
                }]
            }]),
        )
        .unwrap();

        let located = doc.locate(UnitLevel::Commune, "00001").unwrap();
        assert_eq!(located.province.code, "01");
        assert_eq!(located.district.map(|d| d.code.as_str()), Some("001"));
    }

    #[test]
    fn wards_and_children_spellings_are_communes_in_v2() {
        let doc = document_from_value(
            SchemaVersion::V2,
            json!({ "provinces": [
                { "code": 1, "name": "Hà Nội", "wards": [{ "code": "00004", "name": "Ba Đình" }] },
                { "code": "79", "name": "Hồ Chí Minh", "children": [{ "code": "26734", "name": "Sài Gòn" }] }
            ]}),
        )
        .unwrap();

        assert_eq!(doc.provinces[0].code, "1");
        assert!(doc.locate(UnitLevel::Commune, "00004").is_some());
        assert_eq!(doc.all_communes().len(), 2);
    }

    #[test]
    fn scalar_top_level_is_rejected() {
        assert!(document_from_value(SchemaVersion::V2, json!("nope")).is_none());
        assert!(document_from_value(SchemaVersion::V2, json!({ "other": [] })).is_none());
    }

    #[test]
    fn rendering_uses_per_version_keys() {
        let doc = document_from_value(
            SchemaVersion::V2,
            json!([{ "code": "01", "name": "Hà Nội", "children": [{ "code": "00004", "name": "Ba Đình" }] }]),
        )
        .unwrap();

        let rendered = document_to_value(SchemaVersion::V2, &doc);
        assert_eq!(rendered[0]["wards"][0]["code"], json!("00004"));
        assert_eq!(
            document_from_value(SchemaVersion::V2, rendered).unwrap(),
            doc
        );
    }
}
