//! The [`Backend`] trait: the durable storage capability an
//! [`ObjectStore`](crate::ObjectStore) delegates all I/O to.
//!
//! The default engine is [`SqliteBackend`](crate::SqliteBackend). Any other
//! engine, or a test double, plugs in by implementing the three operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult};

/// A positional statement parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    Text(String),
    Null,
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A single result row: column name to cell text (`None` for SQL `NULL`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    columns: BTreeMap<String, Option<String>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column insert.
    pub fn with(mut self, column: impl Into<String>, cell: Option<String>) -> Self {
        self.insert(column, cell);
        self
    }

    /// Set the cell for `column`, replacing any previous one.
    pub fn insert(&mut self, column: impl Into<String>, cell: Option<String>) {
        self.columns.insert(column.into(), cell);
    }

    /// Text of `column`. `None` if the column is missing or `NULL`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(|cell| cell.as_deref())
    }

    /// Returns `true` if the row has a column with this name.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }
}

/// Durable storage capability.
///
/// Implementations must be `Send + Sync` so one backend can be shared by the
/// store across tasks. Errors are returned as-is; the store adds no retry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a statement with positional parameters.
    ///
    /// Returns the number of rows changed.
    async fn execute(&self, statement: &str, params: &[Param]) -> BackendResult<u64>;

    /// Run a query and return its first row, or `Ok(None)` if it matched nothing.
    async fn query_one(&self, statement: &str, params: &[Param]) -> BackendResult<Option<Row>>;

    /// Release the underlying connection.
    async fn close(&self) -> BackendResult<()>;
}

/// Stand-in for an engine that failed to open.
///
/// Every operation reports [`BackendError::Unavailable`], so a store built
/// over it constructs successfully and fails on first use instead.
#[derive(Clone, Debug)]
pub struct UnavailableBackend {
    location: PathBuf,
    reason: String,
}

impl UnavailableBackend {
    pub fn new(location: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }

    fn error(&self) -> BackendError {
        BackendError::Unavailable {
            location: self.location.clone(),
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
impl Backend for UnavailableBackend {
    async fn execute(&self, _statement: &str, _params: &[Param]) -> BackendResult<u64> {
        Err(self.error())
    }

    async fn query_one(&self, _statement: &str, _params: &[Param]) -> BackendResult<Option<Row>> {
        Err(self.error())
    }

    async fn close(&self) -> BackendResult<()> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_get_distinguishes_missing_and_null() {
        let row = Row::new()
            .with("name", Some("a".into()))
            .with("time", None);
        assert_eq!(row.get("name"), Some("a"));
        assert_eq!(row.get("time"), None);
        assert!(row.has_column("time"));
        assert!(!row.has_column("value"));
    }

    #[test]
    fn param_from_str() {
        assert_eq!(Param::from("k"), Param::Text("k".into()));
        assert_eq!(Param::from(String::from("v")), Param::Text("v".into()));
    }

    #[tokio::test]
    async fn unavailable_backend_fails_every_operation() {
        let backend = UnavailableBackend::new("missing/stojo.sqlite3", "no such directory");
        assert!(matches!(
            backend.execute("SELECT 1", &[]).await,
            Err(BackendError::Unavailable { .. })
        ));
        assert!(matches!(
            backend.query_one("SELECT 1", &[]).await,
            Err(BackendError::Unavailable { .. })
        ));
        assert!(matches!(backend.close().await, Err(BackendError::Unavailable { .. })));
    }
}
