use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::units::UnitSnapshot;

pub const DEFAULT_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "history_action", rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
    Restore,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
            HistoryAction::Restore => "restore",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record. Entries are never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub code: String,
    pub action: HistoryAction,
    pub old_data: Option<UnitSnapshot>,
    pub new_data: Option<UnitSnapshot>,
    pub deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub changed_at: OffsetDateTime,
    pub changed_by: String,
}

impl HistoryEntry {
    pub fn new(
        code: impl Into<String>,
        action: HistoryAction,
        old_data: Option<UnitSnapshot>,
        new_data: Option<UnitSnapshot>,
        changed_by: Option<&str>,
    ) -> Self {
        let changed_by = changed_by
            .map(str::trim)
            .filter(|actor| !actor.is_empty())
            .unwrap_or(DEFAULT_ACTOR)
            .to_string();

        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            deleted: action == HistoryAction::Delete,
            action,
            old_data,
            new_data,
            changed_at: OffsetDateTime::now_utc(),
            changed_by,
        }
    }

    /// State a restore of this entry brings back: `oldData` first, then `newData`.
    pub fn restorable_state(&self) -> Option<&UnitSnapshot> {
        self.old_data.as_ref().or(self.new_data.as_ref())
    }

    /// State the unit was left in after this entry was applied.
    pub fn resulting_state(&self) -> Option<&UnitSnapshot> {
        self.new_data.as_ref().or(self.old_data.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Field-level differences between two snapshots, in field-name order.
pub fn diff_snapshots(old: Option<&UnitSnapshot>, new: Option<&UnitSnapshot>) -> Vec<FieldChange> {
    let old = snapshot_fields(old);
    let new = snapshot_fields(new);

    let mut fields: Vec<&String> = old.keys().chain(new.keys()).collect();
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter_map(|field| {
            let before = old.get(field).cloned().unwrap_or(Value::Null);
            let after = new.get(field).cloned().unwrap_or(Value::Null);
            (before != after).then(|| FieldChange {
                field: field.clone(),
                old: before,
                new: after,
            })
        })
        .collect()
}

fn snapshot_fields(snapshot: Option<&UnitSnapshot>) -> serde_json::Map<String, Value> {
    match snapshot.and_then(|value| serde_json::to_value(value).ok()) {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}
