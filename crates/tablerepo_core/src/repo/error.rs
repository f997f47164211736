//! Repository error taxonomy.
//!
//! # Invariants
//! - `NotFound` is only produced by single-row reads and is distinct from
//!   transport, decoding and configuration failures.
//! - A failed rollback keeps the callback error reachable through
//!   `RepoError::Rollback::cause`.

use crate::context::CancelReason;
use crate::db::DbError;
use crate::model::record::{DecodeError, EncodeError};
use crate::query::predicate::PredicateError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Record-type configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NotRegistered {
        type_name: &'static str,
    },
    DuplicateRegistration {
        type_name: &'static str,
    },
    InvalidTarget(String),
    MissingPrimaryKey {
        table: String,
    },
    MultiplePrimaryKeys {
        type_name: &'static str,
        columns: Vec<&'static str>,
    },
    NoColumns {
        type_name: &'static str,
    },
    InvalidIdentifier(String),
    DuplicateColumn {
        type_name: &'static str,
        column: &'static str,
    },
    UnknownColumn {
        table: String,
        column: String,
    },
    InvalidJsonField {
        type_name: &'static str,
        field: &'static str,
    },
    /// An update would assign no column.
    NoWritableColumns {
        table: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRegistered { type_name } => {
                write!(f, "no repository registered for `{type_name}`")
            }
            Self::DuplicateRegistration { type_name } => {
                write!(f, "repository already registered for `{type_name}`")
            }
            Self::InvalidTarget(message) => write!(f, "invalid connection target: {message}"),
            Self::MissingPrimaryKey { table } => {
                write!(f, "table `{table}` declares no primary-key column")
            }
            Self::MultiplePrimaryKeys { type_name, columns } => write!(
                f,
                "`{type_name}` declares more than one primary key: {}",
                columns.join(", ")
            ),
            Self::NoColumns { type_name } => {
                write!(f, "`{type_name}` declares no persisted columns")
            }
            Self::InvalidIdentifier(value) => {
                write!(f, "`{value}` is not a valid SQL identifier")
            }
            Self::DuplicateColumn { type_name, column } => {
                write!(f, "`{type_name}` maps column `{column}` more than once")
            }
            Self::UnknownColumn { table, column } => {
                write!(f, "table `{table}` has no mapped column `{column}`")
            }
            Self::InvalidJsonField { type_name, field } => write!(
                f,
                "`{type_name}.{field}` is a json column but not a document or text field"
            ),
            Self::NoWritableColumns { table } => {
                write!(f, "table `{table}` has no writable columns to update")
            }
        }
    }
}

impl Error for ConfigError {}

/// Error returned by repository and unit-of-work operations.
#[derive(Debug)]
pub enum RepoError {
    Config(ConfigError),
    /// Opening a connection or beginning a transaction failed.
    Connection(DbError),
    /// The store rejected a generated statement.
    Execution(rusqlite::Error),
    Predicate(PredicateError),
    Encode(EncodeError),
    Decode(DecodeError),
    NotFound {
        table: String,
    },
    Cancelled {
        reason: CancelReason,
    },
    Commit(rusqlite::Error),
    Rollback {
        source: rusqlite::Error,
        cause: Box<RepoError>,
    },
    /// Caller-defined failure returned from a unit-of-work callback.
    Callback(Box<dyn Error + Send + Sync>),
}

impl RepoError {
    /// Wraps a caller error so a unit-of-work callback can abort.
    pub fn callback(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Callback(err.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Connection(err) => write!(f, "connection error: {err}"),
            Self::Execution(err) => write!(f, "statement failed: {err}"),
            Self::Predicate(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "{err}"),
            Self::NotFound { table } => write!(f, "no matching row in `{table}`"),
            Self::Cancelled { reason } => write!(f, "operation cancelled: {reason}"),
            Self::Commit(err) => write!(f, "commit failed: {err}"),
            Self::Rollback { source, cause } => {
                write!(f, "rollback failed: {source} (after: {cause})")
            }
            Self::Callback(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Connection(err) => Some(err),
            Self::Execution(err) => Some(err),
            Self::Predicate(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::NotFound { .. } | Self::Cancelled { .. } => None,
            Self::Commit(err) => Some(err),
            Self::Rollback { source, .. } => Some(source),
            Self::Callback(err) => Some(&**err),
        }
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<PredicateError> for RepoError {
    fn from(value: PredicateError) -> Self {
        Self::Predicate(value)
    }
}

impl From<EncodeError> for RepoError {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for RepoError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Execution(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RepoError};
    use std::error::Error;

    #[test]
    fn rollback_error_keeps_callback_cause() {
        let err = RepoError::Rollback {
            source: rusqlite::Error::InvalidQuery,
            cause: Box::new(RepoError::callback("boom")),
        };
        assert!(err.to_string().contains("boom"));
        assert!(err.source().is_some());
        match err {
            RepoError::Rollback { cause, .. } => {
                assert!(matches!(*cause, RepoError::Callback(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn not_found_is_distinct() {
        let not_found = RepoError::NotFound {
            table: "widgets".to_string(),
        };
        let config = RepoError::from(ConfigError::InvalidIdentifier("x y".to_string()));
        assert!(not_found.is_not_found());
        assert!(!config.is_not_found());
    }
}
