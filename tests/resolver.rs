mod support;

use std::sync::Arc;

use serde_json::{Value, json};

use dvhc::application::fallback::FallbackError;
use dvhc::application::resolver::{ResolveError, Source, UnitResolver};
use dvhc::domain::units::{SchemaVersion, UnitLevel};

use support::{FallbackFiles, MemoryRepo};

fn v2_file() -> Value {
    json!([
        {
            "code": "01",
            "name": "Thành phố Hà Nội",
            "wards": [
                { "code": "00070", "name": "Phường Hoàn Kiếm" },
                { "code": "00082", "name": "Phường Cửa Nam" }
            ]
        },
        {
            "code": "79",
            "name": "Thành phố Hồ Chí Minh",
            "wards": [{ "code": "26734", "name": "Phường Sài Gòn" }]
        }
    ])
}

fn v1_file() -> Value {
    json!([{
        "code": "01",
        "name": "Thành phố Hà Nội",
        "districts": [{
            "code": "001",
            "name": "Quận Ba Đình",
            "communes": [{ "code": "00001", "name": "Phường Phúc Xá" }]
        }]
    }])
}

fn resolver(repo: &Arc<MemoryRepo>, fallback: &FallbackFiles) -> UnitResolver {
    UnitResolver::new(repo.clone(), fallback.dyn_store())
}

fn codes(units: &[dvhc::application::resolver::UnitView]) -> Vec<&str> {
    units.iter().map(|unit| unit.code.as_str()).collect()
}

#[tokio::test]
async fn empty_repository_falls_back_to_file_communes() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let communes = resolver(&repo, &fallback)
        .list_communes(SchemaVersion::V2, Some("01"))
        .await
        .unwrap();

    assert_eq!(codes(&communes), vec!["00070", "00082"]);
    assert!(communes.iter().all(|c| c.parent_code.as_deref() == Some("01")));
}

#[tokio::test]
async fn failing_repository_takes_the_same_fallback_path() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.fail_reads(true);
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let communes = resolver(&repo, &fallback)
        .list_communes(SchemaVersion::V2, Some("01"))
        .await
        .unwrap();

    assert_eq!(codes(&communes), vec!["00070", "00082"]);
}

#[tokio::test]
async fn repository_rows_win_over_the_file() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.seed(SchemaVersion::V2, UnitLevel::Commune, "00100", Some("01"), "Phường Ba Đình")
        .await;
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let communes = resolver(&repo, &fallback)
        .list_communes(SchemaVersion::V2, Some("01"))
        .await
        .unwrap();

    assert_eq!(codes(&communes), vec!["00100"]);
}

#[tokio::test]
async fn v1_province_communes_are_reached_through_districts() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V1, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::District, "001", Some("01"), "Ba Đình")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::Commune, "00001", Some("001"), "Phúc Xá")
        .await;
    let fallback = FallbackFiles::empty();

    let communes = resolver(&repo, &fallback)
        .list_communes(SchemaVersion::V1, Some("01"))
        .await
        .unwrap();

    assert_eq!(codes(&communes), vec!["00001"]);
}

#[tokio::test]
async fn commune_code_returns_that_commune() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let communes = resolver(&repo, &fallback)
        .list_communes(SchemaVersion::V2, Some("26734"))
        .await
        .unwrap();

    assert_eq!(codes(&communes), vec!["26734"]);
    assert_eq!(communes[0].parent_code.as_deref(), Some("79"));
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let err = resolver(&repo, &fallback)
        .list_communes(SchemaVersion::V2, Some("00000"))
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::NotFound(_)));
}

#[tokio::test]
async fn unreadable_fallback_file_is_an_error_not_an_empty_list() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::missing();

    let err = resolver(&repo, &fallback)
        .list_provinces(SchemaVersion::V2)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Fallback(FallbackError::Io { .. })));
}

#[tokio::test]
async fn districts_come_from_the_v1_file() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let districts = resolver(&repo, &fallback)
        .list_districts(SchemaVersion::V1, Some("01"))
        .await
        .unwrap();

    assert_eq!(codes(&districts), vec!["001"]);
    assert_eq!(districts[0].level, UnitLevel::District);
}

#[tokio::test]
async fn ancestry_walks_the_repository_chain() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V1, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::District, "001", Some("01"), "Ba Đình")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::Commune, "00001", Some("001"), "Phúc Xá")
        .await;
    let fallback = FallbackFiles::empty();

    let found = resolver(&repo, &fallback)
        .ancestry(SchemaVersion::V1, UnitLevel::Commune, "00001")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.source, Source::Repository);
    assert_eq!(found.province.code, "01");
    assert_eq!(found.district.map(|d| d.code), Some("001".to_string()));
    assert_eq!(found.unit.name, "Phúc Xá");
}

#[tokio::test]
async fn broken_repository_chain_falls_back_to_the_file() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V1, UnitLevel::Commune, "00001", Some("001"), "Phúc Xá")
        .await;
    let fallback = FallbackFiles::new(v1_file(), json!([]));

    let found = resolver(&repo, &fallback)
        .ancestry(SchemaVersion::V1, UnitLevel::Commune, "00001")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.source, Source::Fallback);
    assert_eq!(found.province.name, "Thành phố Hà Nội");
}

#[tokio::test]
async fn convert_matches_seeded_repository_units() {
    let repo = MemoryRepo::new();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Thành phố Hà Nội")
        .await;
    repo.seed(SchemaVersion::V2, UnitLevel::Commune, "00070", Some("01"), "Phường Hoàn Kiếm")
        .await;
    let fallback = FallbackFiles::empty();

    let result = resolver(&repo, &fallback)
        .convert_address(SchemaVersion::V2, "Thành phố Hà Nội, Phường Hoàn Kiếm")
        .await
        .unwrap();

    assert!(result.found);
    assert_eq!(result.codes.province.as_deref(), Some("01"));
    assert_eq!(result.codes.commune.as_deref(), Some("00070"));
    assert_eq!(result.matched.commune.as_deref(), Some("Phường Hoàn Kiếm"));
}

#[tokio::test]
async fn convert_ignores_prefixes_case_and_the_middle_part() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let result = resolver(&repo, &fallback)
        .convert_address(SchemaVersion::V1, "hà nội, quận ba đình, phúc xá")
        .await
        .unwrap();

    assert!(result.found);
    assert_eq!(result.codes.commune.as_deref(), Some("00001"));
}

#[tokio::test]
async fn convert_reports_province_only_matches() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(v1_file(), v2_file());

    let result = resolver(&repo, &fallback)
        .convert_address(SchemaVersion::V2, "Hồ Chí Minh, Phường Không Tồn Tại")
        .await
        .unwrap();

    assert!(!result.found);
    assert_eq!(result.codes.province.as_deref(), Some("79"));
    assert_eq!(result.codes.commune, None);
}

#[tokio::test]
async fn single_part_address_is_rejected() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();

    let err = resolver(&repo, &fallback)
        .convert_address(SchemaVersion::V2, "Hà Nội")
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Validation(_)));
}
