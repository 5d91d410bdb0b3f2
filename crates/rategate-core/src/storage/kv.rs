//! Raw key/value backends for the prompt state store.
//!
//! Backends only move strings around; typing, defaults and the
//! read-modify-write rules live in [`PromptStore`](super::PromptStore).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{data_dir, migrations};
use crate::error::StoreError;

/// Durable string storage scoped to one namespace.
pub trait KvBackend: Send {
    /// Read a key. `Ok(None)` means the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write every entry, all or nothing.
    fn put_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError>;

    /// Erase every key of this namespace.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// SQLite-backed storage in the `prompt_state` table.
///
/// Several namespaces can share one database file; each backend instance
/// only sees its own rows.
pub struct SqliteKv {
    conn: Connection,
    namespace: String,
    path: Option<PathBuf>,
}

impl SqliteKv {
    /// Open `<data_dir>/rategate.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open(namespace: &str) -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Self::open_at(dir.join("rategate.db"), namespace)
    }

    /// Open the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>, namespace: &str) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        Self::with_connection(conn, namespace, Some(path))
    }

    /// Open an in-memory database (for tests and ephemeral hosts).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory(namespace: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, namespace, None)
    }

    fn with_connection(
        conn: Connection,
        namespace: &str,
        path: Option<PathBuf>,
    ) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            path,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Database file location, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl KvBackend for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM prompt_state WHERE namespace = ?1 AND key = ?2")?;
        let result = stmt.query_row(params![self.namespace, key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO prompt_state (namespace, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                params![self.namespace, key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM prompt_state WHERE namespace = ?1",
            params![self.namespace],
        )?;
        Ok(())
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}
