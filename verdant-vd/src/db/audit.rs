//! Append-only audit log
//!
//! Every reviewer transition and every promotion write is recorded with a
//! before/after change list and a human-readable reason. Entries are never
//! updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use super::StoreError;

/// One field-level change within an audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub field: String,
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// A recorded audit entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub collection: String,
    pub document_id: String,
    pub changes: Vec<ChangeEntry>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Diff two serializable records field by field (top level only).
pub fn diff_changes<T: Serialize>(before: &T, after: &T) -> Result<Vec<ChangeEntry>, StoreError> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;

    let mut changes = Vec::new();
    if let (serde_json::Value::Object(before), serde_json::Value::Object(after)) =
        (&before, &after)
    {
        let mut fields: Vec<&String> = before.keys().chain(after.keys()).collect();
        fields.sort();
        fields.dedup();

        for field in fields {
            let old = before.get(field).cloned().unwrap_or(serde_json::Value::Null);
            let new = after.get(field).cloned().unwrap_or(serde_json::Value::Null);
            if old != new {
                changes.push(ChangeEntry {
                    field: field.clone(),
                    old,
                    new,
                });
            }
        }
    }

    Ok(changes)
}

/// Append an audit entry.
pub async fn record(
    pool: &SqlitePool,
    action: &str,
    collection: &str,
    document_id: &str,
    changes: &[ChangeEntry],
    reason: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO audit_log (action, collection, document_id, changes, reason, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(action)
    .bind(collection)
    .bind(document_id)
    .bind(serde_json::to_string(changes)?)
    .bind(reason)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// All entries for one document, oldest first.
pub async fn list_for_document(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, action, collection, document_id, changes, reason, created_at
         FROM audit_log WHERE document_id = ? ORDER BY id ASC",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(AuditEntry {
                id: row.get("id"),
                action: row.get("action"),
                collection: row.get("collection"),
                document_id: row.get("document_id"),
                changes: serde_json::from_str(row.get::<&str, _>("changes"))?,
                reason: row.get("reason"),
                created_at: row.get("created_at"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_tables;

    #[test]
    fn diff_reports_only_changed_fields() {
        #[derive(Serialize)]
        struct Record {
            name: String,
            city: String,
        }

        let before = Record {
            name: "Tibits".to_string(),
            city: "Basel".to_string(),
        };
        let after = Record {
            name: "Tibits AG".to_string(),
            city: "Basel".to_string(),
        };

        let changes = diff_changes(&before, &after).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "name");
        assert_eq!(changes[0].old, serde_json::json!("Tibits"));
        assert_eq!(changes[0].new, serde_json::json!("Tibits AG"));
    }

    #[tokio::test]
    async fn record_and_list_round_trip() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_tables(&pool).await.unwrap();

        record(
            &pool,
            "create",
            "venues",
            "doc-1",
            &[ChangeEntry {
                field: "status".to_string(),
                old: serde_json::Value::Null,
                new: serde_json::json!("active"),
            }],
            "promoted from discovery pipeline",
        )
        .await
        .unwrap();

        let entries = list_for_document(&pool, "doc-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "create");
        assert_eq!(entries[0].changes.len(), 1);
        assert_eq!(entries[0].reason, "promoted from discovery pipeline");
    }
}
