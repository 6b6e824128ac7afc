use std::path::PathBuf;

/// Errors raised by a backing store.
///
/// `ObjectStore` never inspects or rewrites these; they reach the caller
/// wrapped in the [`StoreError`] variant naming the operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Error from the SQLite engine.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The backing store could not be opened at construction time.
    #[error("could not connect to database '{}': {reason}", location.display())]
    Unavailable { location: PathBuf, reason: String },

    /// The connection was already released by `close`.
    #[error("database connection is closed")]
    Closed,

    /// A blocking engine task panicked or was cancelled.
    #[error("backend task failed: {0}")]
    Task(String),

    /// Failure reported by a foreign backend implementation.
    #[error("{0}")]
    Other(String),
}

/// Result alias for backing store operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The table-creation statement failed.
    #[error("schema creation failed: {0}")]
    Schema(#[source] BackendError),

    /// The upsert statement failed.
    #[error("write failed: {0}")]
    Write(#[source] BackendError),

    /// The select statement failed.
    #[error("read failed: {0}")]
    Read(#[source] BackendError),

    /// Releasing the backing store failed.
    #[error("close failed: {0}")]
    Close(#[source] BackendError),

    /// The value could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The stored payload for `name` is not valid for the requested type.
    #[error("corrupt value for '{name}': {source}")]
    Deserialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The record for `name` exists but its `value` cell is `NULL`.
    #[error("record '{name}' has no value")]
    MissingPayload { name: String },

    /// Names must be non-empty.
    #[error("invalid object name: {0:?}")]
    InvalidName(String),

    /// A statement override or config file was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// The underlying backing store error, if this failure came from one.
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Schema(e) | Self::Write(e) | Self::Read(e) | Self::Close(e) => Some(e),
            _ => None,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_is_exposed_verbatim() {
        let err = StoreError::Write(BackendError::Other("disk full".into()));
        assert!(matches!(err.backend(), Some(BackendError::Other(m)) if m == "disk full"));
        assert_eq!(err.to_string(), "write failed: disk full");
    }

    #[test]
    fn non_backend_errors_have_no_source_backend() {
        assert!(StoreError::InvalidName(String::new()).backend().is_none());
        assert!(StoreError::InvalidConfig("x".into()).backend().is_none());
    }

    #[test]
    fn unavailable_message_names_location() {
        let err = BackendError::Unavailable {
            location: PathBuf::from("/nope/stojo.sqlite3"),
            reason: "unable to open".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not connect to database '/nope/stojo.sqlite3': unable to open"
        );
    }
}
