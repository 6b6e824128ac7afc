//! Constructor-time configuration: database location and the three
//! statements the store issues.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Database file used when neither a backend nor a location is supplied.
pub const DEFAULT_LOCATION: &str = "stojo.sqlite3";

/// Default table-creation statement.
pub const DEFAULT_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS stojo (
    name TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    time DATETIME DEFAULT CURRENT_TIMESTAMP)";

/// Default write statement. Binds `(name, value)`.
pub const DEFAULT_UPSERT: &str = "INSERT OR REPLACE INTO stojo (name, value) VALUES (?, ?)";

/// Default read statement. Binds `(name)`.
pub const DEFAULT_SELECT: &str = "SELECT * FROM stojo WHERE name = ?";

/// The statements issued against the backing store.
///
/// Overrides must keep the parameter shape of the defaults: `upsert` binds
/// the name then the serialized value, `select` binds the name and returns
/// a `value` column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statements {
    /// Creates the table. Must be idempotent.
    pub schema: String,
    /// Inserts or replaces one record.
    pub upsert: String,
    /// Reads at most one record by name.
    pub select: String,
}

impl Default for Statements {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            upsert: DEFAULT_UPSERT.to_string(),
            select: DEFAULT_SELECT.to_string(),
        }
    }
}

impl Statements {
    /// Check that every statement is present and binds the expected
    /// number of positional parameters.
    pub fn validate(&self) -> StoreResult<()> {
        check("schema", &self.schema, None)?;
        check("upsert", &self.upsert, Some(2))?;
        check("select", &self.select, Some(1))?;
        Ok(())
    }
}

fn check(label: &str, statement: &str, expected: Option<usize>) -> StoreResult<()> {
    if statement.trim().is_empty() {
        return Err(StoreError::InvalidConfig(format!("{label} statement is empty")));
    }
    if let Some(expected) = expected {
        let found = positional_params(statement);
        if found != expected {
            return Err(StoreError::InvalidConfig(format!(
                "{label} statement must bind {expected} parameter(s), found {found}"
            )));
        }
    }
    Ok(())
}

/// Number of positional parameters a statement binds, counted the way
/// SQLite numbers them: a bare `?` takes the next index, `?N` takes index N,
/// and the count is the highest index used. Quoted text is skipped.
pub fn positional_params(statement: &str) -> usize {
    let mut highest = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = statement.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                        digits.push(*d);
                        chars.next();
                    }
                    highest = match digits.parse::<usize>() {
                        Ok(n) => highest.max(n),
                        Err(_) => highest + 1,
                    };
                }
                _ => {}
            },
        }
    }
    highest
}

/// Full store configuration, loadable from TOML.
///
/// ```toml
/// location = "data/objects.sqlite3"
///
/// [statements]
/// select = "SELECT value FROM stojo WHERE name = ?"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file opened when no backend is supplied.
    pub location: PathBuf,
    /// Statement overrides.
    pub statements: Statements,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from(DEFAULT_LOCATION),
            statements: Statements::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration pointing at `location`.
    pub fn at(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.location.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("location is empty".into()));
        }
        self.statements.validate()
    }
}
