//! Typed single-table repositories over SQLite.
//!
//! Record types declare their columns once through [`Persistable`]; the
//! crate extracts column metadata, builds parameterized CRUD statements and
//! runs them inside a transaction-scoped unit of work.

pub mod context;
pub mod db;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod query;
pub mod registry;
pub mod repo;
mod unit_of_work;

pub use context::{CancelReason, OpContext};
pub use db::{open_target, ConnectionTarget, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LogTarget};
pub use metadata::{
    extract_columns, find_primary_key_column, is_valid_identifier, require_primary_key,
    TableMapping,
};
pub use model::column::{ColumnDescriptor, ColumnKind, FieldSpec, FieldType, ValueKind};
pub use model::record::{DecodeError, EncodeError, FieldValue, FromColumn, Persistable, RowValues};
pub use query::options::{OrderBy, SelectOptions, SortDirection};
pub use query::predicate::{CompareOp, Literal, Predicate, PredicateError, RenderedPredicate};
pub use registry::{Registration, RepositoryRegistry};
pub use repo::error::{ConfigError, RepoError, RepoResult};
pub use repo::sqlite_repo::{Repository, SqliteRepository};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
