//! State store trait with SQLite and in-memory implementations.

#[cfg(test)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::error::StateError;
use super::schema;

/// Durable key/value storage for navigation state.
///
/// Object-safe so sources can share one store via `Arc<dyn StateStore>`.
/// Absent keys read as `None`; callers apply their own sentinel defaults.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StateError>;
}

/// SQLite implementation of the state store.
pub struct SqliteStateStore {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStateStore {
    /// Open the store at `path`, creating the file and its directory if needed.
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| StateError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let conn = Connection::open(&db_path).map_err(|source| StateError::Open {
                path: db_path.clone(),
                source,
            })?;
            // One small write per cursor move; WAL keeps those cheap.
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Self::prepare(conn)
        })
        .await??;

        tracing::debug!(path = %path.display(), "State store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(|source| StateError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Ok(Self {
            conn: Mutex::new(Self::prepare(conn)?),
            path: PathBuf::from(":memory:"),
        })
    }

    fn prepare(conn: Connection) -> Result<Connection, StateError> {
        conn.pragma_update(None, "synchronous", "FULL")?;
        schema::migrate(&conn)?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StateError::Poisoned)?;

        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(StateError::read(key))?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let updated_at = Utc::now().timestamp();

        let conn = self
            .conn
            .lock()
            .map_err(|_| StateError::Poisoned)?;

        conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![key, value, updated_at],
        )
        .map_err(StateError::write(key))?;

        Ok(())
    }
}

/// Volatile store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StateError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StateError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
