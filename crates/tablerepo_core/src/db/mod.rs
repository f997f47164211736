//! SQLite connection targets and connection bootstrap.
//!
//! # Responsibility
//! - Describe where a record type's table lives (`ConnectionTarget`).
//! - Open and configure SQLite connections for repository use.
//!
//! # Invariants
//! - Repository code only ever sees an opened connection or transaction,
//!   never the target fields.
//! - Schema management stays with the caller; opening never creates tables.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod open;

pub use open::open_target;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidTarget(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidTarget(message) => write!(f, "invalid connection target: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidTarget(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Location of the database holding a registered table.
///
/// Deserializes from JSON such as `{"mode":"file","path":"/var/db/app.sqlite3"}`
/// or `{"mode":"shared_memory","name":"scratch"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConnectionTarget {
    /// SQLite database file, created on first open.
    File { path: PathBuf },
    /// Named in-memory database shared by connections of this process.
    ///
    /// The database lives only while at least one connection to it is open.
    SharedMemory { name: String },
}

impl ConnectionTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn shared_memory(name: impl Into<String>) -> Self {
        Self::SharedMemory { name: name.into() }
    }

    /// Parses a target from its JSON configuration form.
    pub fn from_json_str(raw: &str) -> DbResult<Self> {
        let target: Self =
            serde_json::from_str(raw).map_err(|err| DbError::InvalidTarget(err.to_string()))?;
        target.validate()?;
        Ok(target)
    }

    /// Rejects targets that cannot be opened as written.
    pub fn validate(&self) -> DbResult<()> {
        match self {
            Self::File { path } if path.as_os_str().is_empty() => {
                Err(DbError::InvalidTarget("file path cannot be empty".to_string()))
            }
            Self::SharedMemory { name } if !is_valid_memory_name(name) => Err(
                DbError::InvalidTarget(format!("shared memory name `{name}` is not allowed")),
            ),
            _ => Ok(()),
        }
    }

    /// Driver-level open string for this target.
    pub fn connection_string(&self) -> String {
        match self {
            Self::File { path } => path.display().to_string(),
            Self::SharedMemory { name } => format!("file:{name}?mode=memory&cache=shared"),
        }
    }

    /// Short label for log events; never includes the full path.
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::SharedMemory { .. } => "shared_memory",
        }
    }
}

fn is_valid_memory_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
