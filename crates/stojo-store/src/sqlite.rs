//! SQLite engine for [`Backend`], built on `rusqlite`.
//!
//! `rusqlite` is synchronous, so every call runs on tokio's blocking pool
//! via `spawn_blocking` and the async caller suspends until it finishes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::backend::{Backend, Param, Row};
use crate::error::{BackendError, BackendResult};

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Location reported for in-memory databases.
const MEMORY_LOCATION: &str = ":memory:";

/// SQLite-backed [`Backend`].
///
/// The connection sits behind a mutex so the handle can be moved into
/// blocking tasks. `close` takes it out; later calls fail with
/// [`BackendError::Closed`].
pub struct SqliteBackend {
    location: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteBackend {
    /// Open (or create) a database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::from_connection(path, conn)
    }

    /// Open a private in-memory database. Data is lost on close.
    pub fn open_in_memory() -> BackendResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(Path::new(MEMORY_LOCATION), conn)
    }

    /// Wrap an existing connection, e.g. one opened with custom flags.
    pub fn from_connection(location: impl Into<PathBuf>, conn: Connection) -> BackendResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let location = location.into();
        debug!(location = %location.display(), "opened sqlite database");
        Ok(Self {
            location,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Path the database was opened from (`:memory:` for in-memory databases).
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Run `f` against the connection slot on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> BackendResult<T>
    where
        F: FnOnce(&mut Option<Connection>) -> BackendResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut slot = conn
                .lock()
                .map_err(|e| BackendError::Task(format!("connection lock poisoned: {e}")))?;
            f(&mut *slot)
        })
        .await
        .map_err(|e| BackendError::Task(e.to_string()))?
    }
}

fn to_sql(param: &Param) -> Value {
    match param {
        Param::Text(text) => Value::Text(text.clone()),
        Param::Null => Value::Null,
    }
}

fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn execute(&self, statement: &str, params: &[Param]) -> BackendResult<u64> {
        let statement = statement.to_string();
        let values: Vec<Value> = params.iter().map(to_sql).collect();
        self.with_conn(move |slot| {
            let conn = slot.as_ref().ok_or(BackendError::Closed)?;
            let changed = conn.execute(&statement, params_from_iter(values))?;
            Ok(changed as u64)
        })
        .await
    }

    async fn query_one(&self, statement: &str, params: &[Param]) -> BackendResult<Option<Row>> {
        let statement = statement.to_string();
        let values: Vec<Value> = params.iter().map(to_sql).collect();
        self.with_conn(move |slot| {
            let conn = slot.as_ref().ok_or(BackendError::Closed)?;
            let mut stmt = conn.prepare(&statement)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query(params_from_iter(values))?;
            let Some(found) = rows.next()? else {
                return Ok(None);
            };
            let mut row = Row::new();
            for (idx, name) in names.into_iter().enumerate() {
                row.insert(name, cell_text(found.get_ref(idx)?));
            }
            Ok(Some(row))
        })
        .await
    }

    async fn close(&self) -> BackendResult<()> {
        let location = self.location.clone();
        self.with_conn(move |slot| {
            let conn = slot.take().ok_or(BackendError::Closed)?;
            match conn.close() {
                Ok(()) => {
                    debug!(location = %location.display(), "closed sqlite database");
                    Ok(())
                }
                Err((conn, e)) => {
                    // Keep the handle so a later close can retry.
                    *slot = Some(conn);
                    Err(e.into())
                }
            }
        })
        .await
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .finish()
    }
}
