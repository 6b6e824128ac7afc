use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn, Dispatch};

use crate::backend::{Backend, Param, Row, UnavailableBackend};
use crate::config::{Statements, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::sqlite::SqliteBackend;

/// Format SQLite uses for `CURRENT_TIMESTAMP`.
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// A stored record as read back from the backing store.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Unique name of the record.
    pub name: String,
    /// Decoded payload. `Value::Null` if `null` was stored.
    pub value: Value,
    /// Write time, when the select statement returns a parseable `time` column.
    pub time: Option<NaiveDateTime>,
}

/// Persistent name-to-object store.
///
/// Values are serialized to JSON and written with one upsert per `store`;
/// `fetch` reads them back by name. The table is created lazily by the first
/// operation on each instance. Concurrent first callers share a single
/// in-flight creation, and a failed creation is retried by the next call.
///
/// Backend failures are returned wrapped in the variant naming the operation
/// ([`StoreError::Schema`], [`StoreError::Write`], [`StoreError::Read`],
/// [`StoreError::Close`]) with the original error untouched; nothing is retried.
pub struct ObjectStore {
    backend: Arc<dyn Backend>,
    statements: Statements,
    schema: OnceCell<()>,
    logger: Option<Dispatch>,
}

impl ObjectStore {
    /// Start building a store.
    pub fn builder() -> ObjectStoreBuilder {
        ObjectStoreBuilder::default()
    }

    /// Open the SQLite database named by `config`.
    ///
    /// Never fails. If the database cannot be opened a warning is logged and
    /// every later operation reports the connection error.
    pub fn open(config: StoreConfig) -> Self {
        let backend = connect(&config.location, None);
        Self::from_parts(backend, config.statements, None)
    }

    /// Use a caller-supplied backend with the default statements.
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        Self::from_parts(Arc::new(backend), Statements::default(), None)
    }

    fn from_parts(
        backend: Arc<dyn Backend>,
        statements: Statements,
        logger: Option<Dispatch>,
    ) -> Self {
        Self {
            backend,
            statements,
            schema: OnceCell::new(),
            logger,
        }
    }

    /// The statements this store issues.
    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// Returns `true` once schema creation has succeeded on this instance.
    pub fn schema_ready(&self) -> bool {
        self.schema.initialized()
    }

    /// Create the table if it does not exist.
    ///
    /// Every other operation calls this first, so explicit use is optional.
    /// Repeated calls after a success return immediately.
    pub async fn init(&self) -> StoreResult<()> {
        self.schema
            .get_or_try_init(|| async move {
                self.backend
                    .execute(&self.statements.schema, &[])
                    .await
                    .map_err(StoreError::Schema)?;
                self.log(|| info!("object table ready"));
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Store `value` under `name`, replacing any previous value.
    pub async fn store<T>(&self, name: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        self.init().await?;

        let payload = serde_json::to_string(value).map_err(StoreError::Serialize)?;
        let bytes = payload.len();
        self.backend
            .execute(&self.statements.upsert, &[Param::from(name), Param::Text(payload)])
            .await
            .map_err(StoreError::Write)?;

        self.log(|| debug!(name, bytes, "stored object"));
        Ok(())
    }

    /// Fetch the value stored under `name`.
    ///
    /// Returns `Ok(None)` both when nothing was stored and when `null` was
    /// stored. Use [`contains`](Self::contains) to tell the two apart.
    pub async fn fetch<T>(&self, name: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.fetch_value(name).await? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Deserialize {
                name: name.to_string(),
                source,
            })
    }

    /// Like [`fetch`](Self::fetch), returning the untyped JSON value.
    pub async fn fetch_value(&self, name: &str) -> StoreResult<Option<Value>> {
        let row = self.select(name).await?;
        let value = match &row {
            Some(row) => payload(name, row)?,
            None => Value::Null,
        };
        self.log(|| debug!(name, found = row.is_some(), "fetched object"));
        Ok(match value {
            Value::Null => None,
            value => Some(value),
        })
    }

    /// Returns `true` if a record exists for `name`, even one holding `null`.
    pub async fn contains(&self, name: &str) -> StoreResult<bool> {
        Ok(self.select(name).await?.is_some())
    }

    /// Read the full record for `name`, including its write time.
    pub async fn record(&self, name: &str) -> StoreResult<Option<Record>> {
        let Some(row) = self.select(name).await? else {
            return Ok(None);
        };
        let value = payload(name, &row)?;
        let time = row
            .get("time")
            .and_then(|t| NaiveDateTime::parse_from_str(t, SQLITE_TIMESTAMP).ok());
        Ok(Some(Record {
            name: row.get("name").unwrap_or(name).to_string(),
            value,
            time,
        }))
    }

    /// Release the backing store. Operations after a successful close fail.
    pub async fn close(&self) -> StoreResult<()> {
        self.backend.close().await.map_err(StoreError::Close)?;
        self.log(|| debug!("object store closed"));
        Ok(())
    }

    async fn select(&self, name: &str) -> StoreResult<Option<Row>> {
        self.init().await?;
        self.backend
            .query_one(&self.statements.select, &[Param::from(name)])
            .await
            .map_err(StoreError::Read)
    }

    /// Emit events into the configured logger, or the global default.
    fn log<R>(&self, event: impl FnOnce() -> R) -> R {
        emit(self.logger.as_ref(), event)
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("statements", &self.statements)
            .field("schema_ready", &self.schema_ready())
            .finish()
    }
}

/// Decode the `value` column of a selected row.
///
/// A row without that column means the select statement does not fit the
/// store; a `NULL` cell is a record with no payload. Neither is a stored `null`.
fn payload(name: &str, row: &Row) -> StoreResult<Value> {
    if !row.has_column("value") {
        return Err(StoreError::InvalidConfig(
            "select statement must return a `value` column".into(),
        ));
    }
    let text = row.get("value").ok_or_else(|| StoreError::MissingPayload {
        name: name.to_string(),
    })?;
    serde_json::from_str(text).map_err(|source| StoreError::Deserialize {
        name: name.to_string(),
        source,
    })
}

fn emit<R>(logger: Option<&Dispatch>, event: impl FnOnce() -> R) -> R {
    match logger {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, event),
        None => event(),
    }
}

/// Open the default SQLite engine, falling back to an always-failing
/// backend so construction itself cannot fail.
fn connect(location: &Path, logger: Option<&Dispatch>) -> Arc<dyn Backend> {
    match SqliteBackend::open(location) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            emit(logger, || {
                warn!(location = %location.display(), error = %e, "could not connect to database")
            });
            Arc::new(UnavailableBackend::new(location, e.to_string()))
        }
    }
}

/// Builder for [`ObjectStore`].
///
/// Without a backend, the SQLite database at `location` (default
/// `stojo.sqlite3`) is opened when [`build`](Self::build) runs.
#[derive(Default)]
pub struct ObjectStoreBuilder {
    backend: Option<Arc<dyn Backend>>,
    location: Option<PathBuf>,
    statements: Option<Statements>,
    logger: Option<Dispatch>,
}

impl ObjectStoreBuilder {
    /// Use this backend instead of opening one.
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Use a backend shared with other owners.
    pub fn shared_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Database file to open when no backend is supplied.
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Override the schema, upsert, and select statements.
    pub fn statements(mut self, statements: Statements) -> Self {
        self.statements = Some(statements);
        self
    }

    /// Take location and statements from a loaded config.
    pub fn config(self, config: StoreConfig) -> Self {
        self.location(config.location).statements(config.statements)
    }

    /// Route this store's log events (including connection warnings) to
    /// `dispatch` instead of the global subscriber.
    pub fn logger(mut self, dispatch: Dispatch) -> Self {
        self.logger = Some(dispatch);
        self
    }

    /// Validate the statements and create the store.
    ///
    /// Only invalid statements fail here. A database that cannot be opened
    /// is logged as a warning and reported by the first operation.
    pub fn build(self) -> StoreResult<ObjectStore> {
        let statements = self.statements.unwrap_or_default();
        statements.validate()?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                let location = self
                    .location
                    .unwrap_or_else(|| StoreConfig::default().location);
                connect(&location, self.logger.as_ref())
            }
        };
        Ok(ObjectStore::from_parts(backend, statements, self.logger))
    }
}
