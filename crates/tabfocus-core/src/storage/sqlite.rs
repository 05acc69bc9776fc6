//! SQLite-backed key-value storage.
//!
//! One `kv` table shared by all areas; each [`SqliteStorage`] handle only sees
//! rows of its own area. Queries run on tokio's blocking pool so a slow disk
//! never stalls the tasks sharing the runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{data_dir, Storage};
use crate::error::{CoreError, StorageError};

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    area: String,
}

impl SqliteStorage {
    /// Open the database at `~/.config/tabfocus/tabfocus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open(area: &str) -> Result<Self, CoreError> {
        let path = data_dir()?.join("tabfocus.db");
        Ok(Self::open_at(&path, area)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path, area: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, area)
    }

    /// Open an in-memory database.
    pub fn open_memory(area: &str) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, area)
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    fn with_connection(conn: Connection, area: &str) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                area  TEXT NOT NULL,
                key   TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (area, key)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            area: area.to_string(),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            f(&*guard)
        })
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str, default: u64) -> Result<u64, StorageError> {
        let area = self.area.clone();
        let key = key.to_string();
        self.with_conn(move |conn| {
            let result = conn.query_row(
                "SELECT value FROM kv WHERE area = ?1 AND key = ?2",
                params![area, key],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(v) => v.parse::<u64>().map_err(|_| StorageError::Corrupt { key, value: v }),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(default),
                Err(e) => Err(StorageError::Read {
                    key,
                    message: e.to_string(),
                }),
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), StorageError> {
        let area = self.area.clone();
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (area, key, value) VALUES (?1, ?2, ?3)",
                params![area, key, value.to_string()],
            )
            .map_err(|e| StorageError::Write {
                key,
                message: e.to_string(),
            })?;
            Ok(())
        })
        .await
    }
}
