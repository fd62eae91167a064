mod support;

use serde_json::{Value, json};

use dvhc::application::bridge::{BridgeError, BridgeService};
use dvhc::application::resolver::{Source, UnitResolver};
use dvhc::domain::units::{SchemaVersion, UnitLevel};

use support::{FallbackFiles, MemoryRepo};

#[tokio::test]
async fn code_known_only_to_v1_maps_with_null_v2() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V1, UnitLevel::Province, "01", None, "Thành phố Hà Nội")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::District, "01001", Some("01"), "Quận Ba Đình")
        .await;
    repo.seed(
        SchemaVersion::V1,
        UnitLevel::Commune,
        "01001001",
        Some("01001"),
        "Phường Phúc Xá",
    )
    .await;
    let fallback = FallbackFiles::empty();
    let bridge = BridgeService::new(UnitResolver::new(repo.clone(), fallback.dyn_store()));

    let mapping = bridge.map_code("01001001").await.unwrap();

    let v1 = mapping.v1.as_ref().unwrap();
    assert_eq!(v1.province.code, "01");
    assert_eq!(v1.district.as_ref().map(|d| d.name.as_str()), Some("Quận Ba Đình"));
    assert_eq!(v1.commune.name, "Phường Phúc Xá");
    assert_eq!(v1.source, Source::Repository);
    assert!(mapping.v2.is_none());

    let body = serde_json::to_value(&mapping).unwrap();
    assert_eq!(body["code"], json!("01001001"));
    assert_eq!(body["v2"], Value::Null);
}

#[tokio::test]
async fn both_generations_resolve_from_the_files() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(
        json!([{
            "code": "01",
            "name": "Hà Nội",
            "districts": [{
                "code": "002",
                "name": "Hoàn Kiếm",
                "communes": [{ "code": "00070", "name": "Hàng Trống" }]
            }]
        }]),
        json!([{ "code": "01", "name": "Hà Nội", "wards": [{ "code": "00070", "name": "Hoàn Kiếm" }] }]),
    );
    let bridge = BridgeService::new(UnitResolver::new(repo.clone(), fallback.dyn_store()));

    let mapping = bridge.map_code(" 00070 ").await.unwrap();

    assert_eq!(mapping.code, "00070");
    assert_eq!(mapping.v1.as_ref().unwrap().commune.name, "Hàng Trống");
    assert_eq!(mapping.v2.as_ref().unwrap().commune.name, "Hoàn Kiếm");
    assert_eq!(mapping.v2.as_ref().unwrap().source, Source::Fallback);
}

#[tokio::test]
async fn unknown_code_is_not_found_and_blank_code_is_invalid() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    let bridge = BridgeService::new(UnitResolver::new(repo.clone(), fallback.dyn_store()));

    let missing = bridge.map_code("99999").await.unwrap_err();
    assert!(matches!(missing, BridgeError::NotFound(_)));
    assert!(missing.to_string().contains("99999"));
    assert!(matches!(
        bridge.map_code("  ").await.unwrap_err(),
        BridgeError::Validation(_)
    ));
}
