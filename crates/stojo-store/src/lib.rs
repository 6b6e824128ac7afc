//! Persistent name-to-object store.
//!
//! Stojo keeps arbitrary serializable values under unique names in a single
//! table (`name`, `value`, `time`) of a durable backing store, SQLite by
//! default. A value written with [`ObjectStore::store`] can be read back
//! later with [`ObjectStore::fetch`].
//!
//! ```no_run
//! # async fn demo() -> stojo_store::StoreResult<()> {
//! use stojo_store::{ObjectStore, StoreConfig};
//!
//! let store = ObjectStore::open(StoreConfig::default());
//! store.store("test.foo", &serde_json::json!({ "foo": "foo" })).await?;
//! let foo: Option<serde_json::Value> = store.fetch("test.foo").await?;
//! store.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! All I/O goes through the [`Backend`] trait:
//!
//! - [`SqliteBackend`] -- the default engine (`stojo.sqlite3` unless configured)
//! - [`UnavailableBackend`] -- stand-in used when the default engine cannot be opened
//!
//! # Rules
//!
//! 1. At most one record exists per name; `store` replaces, never merges.
//! 2. The table is created lazily, once per store instance.
//! 3. A stored `null` and a missing name both fetch as `None`.
//! 4. Backend errors are propagated unchanged and never retried.

pub mod backend;
pub mod config;
pub mod error;
pub mod sqlite;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::{Backend, Param, Row, UnavailableBackend};
pub use config::{Statements, StoreConfig, DEFAULT_LOCATION};
pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use sqlite::SqliteBackend;
pub use store::{ObjectStore, ObjectStoreBuilder, Record};
