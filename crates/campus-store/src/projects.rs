//! Project documents: opaque JSON payloads keyed by id, ordered by update
//! time.

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use campus_core::ProjectId;

use crate::bind::{Params, SqlValue};
use crate::database::Database;
use crate::driver::Row;
use crate::error::StoreError;
use crate::schema;

pub struct ProjectRepo {
    db: Database,
}

impl ProjectRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.db.run_once("projects", || {
            self.db.execute(schema::PRAGMAS, &Params::none())?;
            self.db.execute(schema::PROJECTS_TABLE, &Params::none())
        })
    }

    /// Write a document, assigning an id and timestamps as needed. Returns
    /// the document as stored.
    #[instrument(skip(self, document))]
    pub fn upsert(&self, document: Value) -> Result<Value, StoreError> {
        self.ensure_schema()?;
        let Value::Object(mut document) = document else {
            return Err(StoreError::InvalidPayload(
                "project document must be a JSON object".into(),
            ));
        };

        let id = match document.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ProjectId::new().into_string(),
        };
        let now = Utc::now().to_rfc3339();
        let created_at = document
            .get("createdAt")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| now.clone());

        document.insert("id".into(), Value::String(id.clone()));
        document.insert("createdAt".into(), Value::String(created_at.clone()));
        document.insert("updatedAt".into(), Value::String(now.clone()));

        let document = Value::Object(document);
        let payload = serde_json::to_string(&document)?;
        self.db.execute(
            "INSERT INTO projects (id, payload, created_at, updated_at)
             VALUES (:id, :payload, :createdAt, :updatedAt)
             ON CONFLICT(id) DO UPDATE SET
                 payload = excluded.payload,
                 updated_at = excluded.updated_at;",
            &Params::named([
                ("id", SqlValue::from(id)),
                ("payload", SqlValue::from(payload)),
                ("createdAt", SqlValue::from(created_at)),
                ("updatedAt", SqlValue::from(now)),
            ]),
        )?;
        Ok(document)
    }

    /// All documents, most recently updated first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Value>, StoreError> {
        self.ensure_schema()?;
        let rows = self.db.query(
            "SELECT payload FROM projects ORDER BY updated_at DESC;",
            &Params::none(),
        )?;
        rows.iter().map(payload_from_row).collect()
    }

    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_schema()?;
        if id.trim().is_empty() {
            return Ok(None);
        }
        let rows = self.db.query(
            "SELECT payload FROM projects WHERE id = :id LIMIT 1;",
            &Params::named([("id", SqlValue::from(id))]),
        )?;
        rows.first().map(payload_from_row).transpose()
    }

    /// Remove a document. Removing an absent id is not an error.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_schema()?;
        if id.trim().is_empty() {
            return Ok(());
        }
        self.db.execute(
            "DELETE FROM projects WHERE id = :id;",
            &Params::named([("id", SqlValue::from(id))]),
        )
    }
}

fn payload_from_row(row: &Row) -> Result<Value, StoreError> {
    let raw = match row.get("payload") {
        Some(Value::String(s)) => s,
        other => {
            return Err(StoreError::CorruptRow {
                table: "projects",
                column: "payload",
                detail: format!("expected text, got {other:?}"),
            })
        }
    };
    serde_json::from_str(raw).map_err(|err| StoreError::CorruptRow {
        table: "projects",
        column: "payload",
        detail: format!("invalid JSON: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use serde_json::json;
    use std::time::Duration;

    fn repo() -> ProjectRepo {
        let dir =
            std::env::temp_dir().join(format!("campus-projects-test-{}", uuid::Uuid::now_v7()));
        ProjectRepo::new(Database::new(StoreConfig {
            db_path: Some(dir.join("projects.db")),
            force_embedded: true,
            ..StoreConfig::default()
        }))
    }

    #[test]
    fn upsert_assigns_id_and_timestamps() {
        let repo = repo();
        let stored = repo.upsert(json!({"title": "Student radio"})).unwrap();
        let id = stored["id"].as_str().unwrap();
        assert!(id.starts_with("proj_"), "got: {id}");
        assert_eq!(stored["title"], "Student radio");
        assert_eq!(stored["createdAt"], stored["updatedAt"]);
    }

    #[test]
    fn explicit_id_is_preserved() {
        let repo = repo();
        let stored = repo
            .upsert(json!({"id": "proj_fixed", "title": "Hackathon"}))
            .unwrap();
        assert_eq!(stored["id"], "proj_fixed");
        assert_eq!(repo.get("proj_fixed").unwrap().unwrap()["title"], "Hackathon");
    }

    #[test]
    fn update_keeps_creation_time() {
        let repo = repo();
        let stored = repo.upsert(json!({"title": "v1"})).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let mut updated = stored.clone();
        updated["title"] = json!("v2");
        let stored_again = repo.upsert(updated).unwrap();

        assert_eq!(stored_again["id"], stored["id"]);
        assert_eq!(stored_again["createdAt"], stored["createdAt"]);
        assert_ne!(stored_again["updatedAt"], stored["updatedAt"]);

        // Still exactly one document.
        assert_eq!(repo.list().unwrap().len(), 1);
        assert_eq!(repo.list().unwrap()[0]["title"], "v2");
    }

    #[test]
    fn list_orders_by_update_time_descending() {
        let repo = repo();
        let a = repo.upsert(json!({"title": "a"})).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        repo.upsert(json!({"title": "b"})).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        // Touching "a" moves it back to the front.
        repo.upsert(a).unwrap();
        let titles: Vec<String> = repo
            .list()
            .unwrap()
            .iter()
            .map(|d| d["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn get_missing_is_absent() {
        let repo = repo();
        assert!(repo.get("proj_nonexistent").unwrap().is_none());
        assert!(repo.get("").unwrap().is_none());
    }

    #[test]
    fn delete_removes_document() {
        let repo = repo();
        let stored = repo.upsert(json!({"title": "doomed"})).unwrap();
        let id = stored["id"].as_str().unwrap();
        repo.delete(id).unwrap();
        assert!(repo.get(id).unwrap().is_none());

        // Deleting again is fine.
        repo.delete(id).unwrap();
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let repo = repo();
        let err = repo.upsert(json!("just a string")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPayload(_)), "got: {err:?}");
    }
}
