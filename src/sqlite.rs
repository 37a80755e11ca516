// SQLite-backed key-value storage

use crate::storage::{Storage, validate_key};
use crate::store::now_ms;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Slots kept as rows of a single `kv_store` table
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open or create the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    /// Database that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        let storage = Self { db };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating kv_store schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let value = self
            .db
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now_ms()],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_open_creates_file() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("data").join("todostore.db");

        let _storage = SqliteStorage::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_sqlite_set_get_remove() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.get_item("slot").unwrap().is_none());

        storage.set_item("slot", "first").unwrap();
        storage.set_item("slot", "second").unwrap();
        assert_eq!(storage.get_item("slot").unwrap().as_deref(), Some("second"));

        let rows: i64 = storage
            .db()
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        storage.remove_item("slot").unwrap();
        assert!(storage.get_item("slot").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("todostore.db");
        {
            let mut storage = SqliteStorage::open(&db_path).unwrap();
            storage.set_item("slot", "kept").unwrap();
        }
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.get_item("slot").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_sqlite_rejects_bad_key() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.set_item("", "v").is_err());
    }
}
