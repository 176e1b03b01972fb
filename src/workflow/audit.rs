//! Field-level edit tracking.
//!
//! Each edit is diffed against the stored payload; only the latest diff per
//! editor is kept alive on a record. Array-valued fields compare
//! order-insensitively so reordering an id list is not an edit.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{AuditEntry, FieldChange, RfcPayload, User};
use crate::store::Store;

/// Diff two payload snapshots field by field. Field names come from the
/// serialized form, so flattened content fields appear under their own names.
pub fn diff_payloads(old: &RfcPayload, new: &RfcPayload) -> Result<Vec<FieldChange>> {
    let old_map = to_map(old)?;
    let new_map = to_map(new)?;

    let mut keys: Vec<&String> = old_map.keys().chain(new_map.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut changes = Vec::new();
    for key in keys {
        let old_value = old_map.get(key).cloned().unwrap_or(Value::Null);
        let new_value = new_map.get(key).cloned().unwrap_or(Value::Null);
        if !values_equal(&old_value, &new_value) {
            changes.push(FieldChange {
                field: key.clone(),
                old_value,
                new_value,
            });
        }
    }
    Ok(changes)
}

fn to_map(payload: &RfcPayload) -> Result<serde_json::Map<String, Value>> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Internal(
            "payload did not serialize to an object".to_string(),
        )),
        Err(e) => Err(AppError::Internal(format!("JSON encode: {}", e))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            let mut xs: Vec<String> = xs.iter().map(Value::to_string).collect();
            let mut ys: Vec<String> = ys.iter().map(Value::to_string).collect();
            xs.sort();
            ys.sort();
            xs == ys
        }
        _ => a == b,
    }
}

/// Summary line shown in history listings, naming up to three fields
pub fn summarize(changes: &[FieldChange]) -> String {
    let noun = if changes.len() == 1 { "field" } else { "fields" };
    let shown: Vec<&str> = changes.iter().take(3).map(|c| c.field.as_str()).collect();
    if changes.len() > 3 {
        format!(
            "Updated {} {}: {} and {} more",
            changes.len(),
            noun,
            shown.join(", "),
            changes.len() - 3
        )
    } else {
        format!("Updated {} {}: {}", changes.len(), noun, shown.join(", "))
    }
}

/// Record an edit, replacing the editor's previous entry on this record.
/// Best-effort: a storage failure is logged and never unwinds the edit.
pub async fn record_edit(store: &Store, rfc_id: Uuid, editor: &User, changes: Vec<FieldChange>) {
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        rfc_id,
        editor_id: editor.id,
        editor_name: editor.display_name().to_string(),
        summary: summarize(&changes),
        field_changes: changes,
        edited_at: Utc::now(),
    };

    if let Err(e) = store.replace_edit_entry(&entry).await {
        tracing::warn!("failed to record edit history for {}: {}", rfc_id, e);
    }
}
