//! Whole-document persistence for favorites and history.
//!
//! A document is a JSON value stored under a name. Saving always replaces
//! the complete document in one write, so a save either lands or it doesn't.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use skycast_core::{RusqliteErrorExt, StorageError};

/// Storage backend for named JSON documents.
///
/// Calls block; async callers go through `spawn_blocking`.
pub trait Storage: Send + Sync {
    /// Load a document, or `None` if it was never saved.
    fn load_data(&self, name: &str) -> Result<Option<Value>, StorageError>;

    /// Atomically replace the document stored under `name`.
    fn save_data(&self, document: &Value, name: &str) -> Result<(), StorageError>;
}

/// SQLite-backed document storage.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| e.into_storage_error())?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| e.into_storage_error())?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS documents (
                    name TEXT PRIMARY KEY,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                "#,
            )
            .map_err(|e| e.into_storage_error())
    }

    /// Names of all stored documents.
    pub fn document_names(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM documents ORDER BY name")
            .map_err(|e| e.into_storage_error())?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| e.into_storage_error())?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.into_storage_error())
    }
}

impl Storage for SqliteStorage {
    fn load_data(&self, name: &str) -> Result<Option<Value>, StorageError> {
        let body: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT body FROM documents WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.into_storage_error())?;

        body.map(|text| {
            serde_json::from_str(&text).map_err(|e| {
                StorageError::Corruption(format!("document '{}' is not valid JSON: {}", name, e))
            })
        })
        .transpose()
    }

    fn save_data(&self, document: &Value, name: &str) -> Result<(), StorageError> {
        let body = serde_json::to_string(document)?;
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO documents (name, body, updated_at) VALUES (?1, ?2, ?3)",
                params![name, body, Utc::now().to_rfc3339()],
            )
            .map_err(|e| e.into_storage_error())?;
        Ok(())
    }
}

/// Process-local storage, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load_data(&self, name: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.documents.lock().get(name).cloned())
    }

    fn save_data(&self, document: &Value, name: &str) -> Result<(), StorageError> {
        self.documents
            .lock()
            .insert(name.to_string(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_document_is_none() {
        let storage = SqliteStorage::in_memory().unwrap();
        assert_eq!(storage.load_data("favorites").unwrap(), None);
    }

    #[test]
    fn test_save_replaces_whole_document() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage
            .save_data(&json!({"favorites": [{"name": "Oslo"}, {"name": "Rome"}]}), "favorites")
            .unwrap();
        storage
            .save_data(&json!({"favorites": [{"name": "Lima"}]}), "favorites")
            .unwrap();

        let loaded = storage.load_data("favorites").unwrap().unwrap();
        assert_eq!(loaded, json!({"favorites": [{"name": "Lima"}]}));
        assert_eq!(storage.document_names().unwrap(), vec!["favorites".to_string()]);
    }

    #[test]
    fn test_documents_are_independent() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.save_data(&json!([1]), "history").unwrap();
        storage.save_data(&json!([2]), "favorites").unwrap();
        assert_eq!(storage.load_data("history").unwrap(), Some(json!([1])));
        assert_eq!(storage.load_data("favorites").unwrap(), Some(json!([2])));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("skycast.db");

        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.save_data(&json!({"entries": []}), "history").unwrap();
        }

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.load_data("history").unwrap(), Some(json!({"entries": []})));
    }

    #[test]
    fn test_corrupt_body_is_reported() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage
            .conn
            .lock()
            .execute(
                "INSERT INTO documents (name, body, updated_at) VALUES ('history', '{oops', '')",
                [],
            )
            .unwrap();
        assert!(matches!(
            storage.load_data("history"),
            Err(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load_data("x").unwrap(), None);
        storage.save_data(&json!({"a": 1}), "x").unwrap();
        assert_eq!(storage.load_data("x").unwrap(), Some(json!({"a": 1})));
    }
}
