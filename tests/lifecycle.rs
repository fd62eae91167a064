mod support;

use std::sync::Arc;

use serde_json::json;

use dvhc::application::lifecycle::{
    CreateUnitCommand, LifecycleError, RestoreCommand, UnitLifecycleService, UnitTarget,
};
use dvhc::domain::history::HistoryAction;
use dvhc::domain::units::{SchemaVersion, UnitLevel, UnitPatch};

use support::{FallbackFiles, MemoryRepo};

fn service(repo: &Arc<MemoryRepo>, fallback: &FallbackFiles) -> UnitLifecycleService {
    UnitLifecycleService::new(repo.clone(), repo.clone(), repo.clone(), fallback.dyn_store())
}

fn commune(code: &str, parent: &str, name: &str) -> CreateUnitCommand {
    CreateUnitCommand {
        schema_version: SchemaVersion::V2,
        level: UnitLevel::Commune,
        code: code.into(),
        parent_code: Some(parent.into()),
        province_code: None,
        name: name.into(),
        english_name: None,
        administrative_level: Some("Phường".into()),
        decree: None,
        boundary: None,
    }
}

fn restore_latest(code: &str) -> RestoreCommand {
    RestoreCommand {
        code: code.into(),
        history_id: None,
        scope: None,
    }
}

#[tokio::test]
async fn create_writes_a_create_entry_and_rejects_duplicates() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Thành phố Hà Nội")
        .await;
    let service = service(&repo, &fallback);

    let created = service
        .create(Some("editor"), commune("00070", "01", "Phường Hoàn Kiếm"))
        .await
        .unwrap();
    assert_eq!(created.unique_key, "v2-commune-00070");
    assert_eq!(created.parent_code.as_deref(), Some("01"));

    let history = repo.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::Create);
    assert_eq!(history[0].changed_by, "editor");
    assert!(history[0].old_data.is_none());

    let err = service
        .create(None, commune("00070", "01", "Phường Hoàn Kiếm"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Conflict(_)));
}

#[tokio::test]
async fn create_with_unknown_parent_is_parent_not_found() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();

    let err = service(&repo, &fallback)
        .create(None, commune("00070", "99", "Phường Hoàn Kiếm"))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::ParentNotFound { ref code } if code == "99"));
    assert!(err.to_string().starts_with("Không tìm thấy đơn vị cha"));
    assert!(repo.units().await.is_empty());
}

#[tokio::test]
async fn commune_cannot_be_parented_by_another_commune() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.seed(SchemaVersion::V2, UnitLevel::Commune, "00070", Some("01"), "Hoàn Kiếm")
        .await;

    let err = service(&repo, &fallback)
        .create(None, commune("00071", "00070", "Cửa Nam"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ParentNotFound { .. }));
}

#[tokio::test]
async fn delete_then_restore_brings_back_the_pre_delete_name() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(
        json!([]),
        json!([{ "code": "99", "name": "Tỉnh Thử Nghiệm", "wards": [] }]),
    );
    let province = repo
        .seed(SchemaVersion::V2, UnitLevel::Province, "99", None, "Tỉnh Thử Nghiệm")
        .await;
    let service = service(&repo, &fallback);

    let deleted = service
        .soft_delete(None, UnitTarget::Id(province.id))
        .await
        .unwrap();
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());
    assert_eq!(fallback.read(SchemaVersion::V2), json!([]));

    let outcome = service.restore(None, restore_latest("99")).await.unwrap();

    assert_eq!(outcome.unit.id, province.id);
    assert_eq!(outcome.unit.name, "Tỉnh Thử Nghiệm");
    assert!(!outcome.unit.is_deleted);
    assert!(outcome.unit.deleted_at.is_none());

    let actions: Vec<HistoryAction> = repo.history().await.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![HistoryAction::Delete, HistoryAction::Restore]);

    let file = fallback.read(SchemaVersion::V2);
    assert_eq!(file[0]["code"], json!("99"));
}

#[tokio::test]
async fn repeating_a_restore_reapplies_the_same_state() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    let service = service(&repo, &fallback);

    let created = service
        .create(None, commune("00070", "01", "Hoàn Kiếm"))
        .await
        .unwrap();
    service
        .update(
            None,
            UnitTarget::Id(created.id),
            UnitPatch {
                name: Some("Hoàn Kiếm Mới".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service
        .soft_delete(None, UnitTarget::Id(created.id))
        .await
        .unwrap();

    let first = service.restore(None, restore_latest("00070")).await.unwrap();
    let second = service.restore(None, restore_latest("00070")).await.unwrap();

    assert_eq!(first.restored_from, second.restored_from);
    assert_eq!(first.unit.snapshot(), second.unit.snapshot());
    assert_eq!(second.unit.name, "Hoàn Kiếm Mới");

    let restores = repo
        .history()
        .await
        .iter()
        .filter(|entry| entry.action == HistoryAction::Restore)
        .count();
    assert_eq!(restores, 2);
}

#[tokio::test]
async fn restore_from_an_explicit_entry_uses_that_state() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    repo.seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    let service = service(&repo, &fallback);

    let created = service
        .create(None, commune("00070", "01", "Hoàn Kiếm"))
        .await
        .unwrap();
    service
        .update(
            None,
            UnitTarget::commune(SchemaVersion::V2, "00070"),
            UnitPatch {
                name: Some("Tên Tạm".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let create_entry = repo.history().await[0].id;
    let outcome = service
        .restore_by_id(Some("auditor"), created.id, Some(create_entry))
        .await
        .unwrap();

    assert_eq!(outcome.restored_from, create_entry);
    assert_eq!(outcome.unit.name, "Hoàn Kiếm");
    assert_eq!(outcome.entry.changed_by, "auditor");
    assert_eq!(
        outcome.entry.old_data.as_ref().map(|s| s.name.as_str()),
        Some("Tên Tạm")
    );
}

#[tokio::test]
async fn restore_without_history_is_not_found() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();

    let err = service(&repo, &fallback)
        .restore(None, restore_latest("12345"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
}

#[tokio::test]
async fn deleted_units_cannot_be_updated_or_deleted_again() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    let province = repo
        .seed(SchemaVersion::V1, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    let service = service(&repo, &fallback);

    service
        .soft_delete(None, UnitTarget::Id(province.id))
        .await
        .unwrap();

    let update = service
        .update(
            None,
            UnitTarget::Id(province.id),
            UnitPatch {
                name: Some("Hà Nội".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(update, LifecycleError::NotFound(_)));

    let delete = service
        .soft_delete(None, UnitTarget::Id(province.id))
        .await
        .unwrap_err();
    assert!(matches!(delete, LifecycleError::NotFound(_)));
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::empty();
    let province = repo
        .seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;

    let err = service(&repo, &fallback)
        .update(None, UnitTarget::Id(province.id), UnitPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

#[tokio::test]
async fn unreadable_fallback_file_does_not_fail_a_delete() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::missing();
    let province = repo
        .seed(SchemaVersion::V2, UnitLevel::Province, "01", None, "Hà Nội")
        .await;

    let deleted = service(&repo, &fallback)
        .soft_delete(None, UnitTarget::Id(province.id))
        .await
        .unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(repo.history().await.len(), 1);
}

#[tokio::test]
async fn deleting_a_commune_keeps_a_same_coded_district_in_the_file() {
    let repo = MemoryRepo::new();
    let fallback = FallbackFiles::new(
        json!([{
            "code": "01",
            "name": "Hà Nội",
            "districts": [{
                "code": "777",
                "name": "Quận Bảy",
                "communes": [{ "code": "00001", "name": "Phúc Xá" }]
            }],
            "communes": [{ "code": "777", "name": "Phường Bảy" }]
        }]),
        json!([]),
    );
    repo.seed(SchemaVersion::V1, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::Commune, "777", Some("01"), "Phường Bảy")
        .await;

    service(&repo, &fallback)
        .soft_delete(None, UnitTarget::commune(SchemaVersion::V1, "777"))
        .await
        .unwrap();

    let file = fallback.read(SchemaVersion::V1);
    assert_eq!(file[0]["districts"][0]["code"], json!("777"));
    assert_eq!(file[0]["districts"][0]["name"], json!("Quận Bảy"));
    assert_eq!(
        file[0]["districts"][0]["communes"][0]["code"],
        json!("00001")
    );
    assert!(file[0]["communes"].as_array().is_none_or(Vec::is_empty));
}

#[tokio::test]
async fn restore_succeeds_when_the_file_lacks_the_district() {
    let repo = MemoryRepo::new();
    let file = json!([{ "code": "01", "name": "Hà Nội" }]);
    let fallback = FallbackFiles::new(file.clone(), json!([]));
    repo.seed(SchemaVersion::V1, UnitLevel::Province, "01", None, "Hà Nội")
        .await;
    repo.seed(SchemaVersion::V1, UnitLevel::District, "001", Some("01"), "Ba Đình")
        .await;
    let commune = repo
        .seed(SchemaVersion::V1, UnitLevel::Commune, "00001", Some("001"), "Phúc Xá")
        .await;
    let service = service(&repo, &fallback);

    service
        .soft_delete(None, UnitTarget::Id(commune.id))
        .await
        .unwrap();
    let outcome = service.restore(None, restore_latest("00001")).await.unwrap();

    assert!(!outcome.unit.is_deleted);
    assert_eq!(outcome.unit.parent_code.as_deref(), Some("001"));
    assert_eq!(fallback.read(SchemaVersion::V1), file);
}
