//! Column metadata extraction for `Persistable` record types.
//!
//! # Responsibility
//! - Turn a record type's static field annotations into ordered column
//!   descriptors.
//! - Locate the primary-key column.
//! - Validate a record mapping once, before the type is used.
//!
//! # Invariants
//! - Output order always equals field declaration order.
//! - Fields without a storage name or storage kind are never persisted.
//! - Identifiers written into SQL text (table and column names) match
//!   `[A-Za-z_][A-Za-z0-9_]*`.

use crate::model::column::{ColumnDescriptor, ColumnKind, ValueKind};
use crate::model::record::Persistable;
use crate::repo::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid sql identifier regex")
});

/// Returns whether `value` can be written into SQL text as a bare identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Extracts persisted columns of `T` in declaration order.
///
/// `exclude_primary_key` drops the primary-key column; `exclude_read_only`
/// drops read-only columns.
pub fn extract_columns<T: Persistable>(
    exclude_primary_key: bool,
    exclude_read_only: bool,
) -> Vec<ColumnDescriptor> {
    T::fields()
        .iter()
        .filter_map(|spec| spec.descriptor())
        .filter(|column| !(exclude_primary_key && column.is_primary_key))
        .filter(|column| !(exclude_read_only && column.is_read_only))
        .collect()
}

/// Returns the first persisted column flagged as primary key.
pub fn find_primary_key_column<T: Persistable>() -> Option<ColumnDescriptor> {
    T::fields()
        .iter()
        .filter_map(|spec| spec.descriptor())
        .find(|column| column.is_primary_key)
}

/// Returns the primary-key column or a configuration error naming `table`.
pub fn require_primary_key<T: Persistable>(table: &str) -> Result<ColumnDescriptor, ConfigError> {
    find_primary_key_column::<T>().ok_or_else(|| ConfigError::MissingPrimaryKey {
        table: table.to_string(),
    })
}

/// Validated mapping of one record type onto one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Option<ColumnDescriptor>,
}

impl TableMapping {
    /// Validates `T` against `table`.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for a table or column name unsafe to embed in SQL.
    /// - `NoColumns` when `T` persists nothing.
    /// - `DuplicateColumn` when two fields map to one column.
    /// - `MultiplePrimaryKeys` when more than one column is a primary key.
    /// - `InvalidJsonField` when a JSON column is declared on a scalar-only
    ///   value kind.
    pub fn of<T: Persistable>(table: &str) -> Result<Self, ConfigError> {
        let type_name = std::any::type_name::<T>();
        if !is_valid_identifier(table) {
            return Err(ConfigError::InvalidIdentifier(table.to_string()));
        }

        let columns = extract_columns::<T>(false, false);
        if columns.is_empty() {
            return Err(ConfigError::NoColumns { type_name });
        }

        for (index, column) in columns.iter().enumerate() {
            if !is_valid_identifier(column.name) {
                return Err(ConfigError::InvalidIdentifier(column.name.to_string()));
            }
            if columns[..index]
                .iter()
                .any(|earlier| earlier.name.eq_ignore_ascii_case(column.name))
            {
                return Err(ConfigError::DuplicateColumn {
                    type_name,
                    column: column.name,
                });
            }
            let json_capable = matches!(
                column.field_type.kind,
                ValueKind::Document | ValueKind::Text
            );
            if column.kind == ColumnKind::Json && !json_capable {
                return Err(ConfigError::InvalidJsonField {
                    type_name,
                    field: column.field,
                });
            }
        }

        let keys: Vec<&'static str> = columns
            .iter()
            .filter(|column| column.is_primary_key)
            .map(|column| column.name)
            .collect();
        if keys.len() > 1 {
            return Err(ConfigError::MultiplePrimaryKeys {
                type_name,
                columns: keys,
            });
        }

        let primary_key = columns.iter().find(|column| column.is_primary_key).copied();
        Ok(Self {
            table: table.to_string(),
            columns,
            primary_key,
        })
    }
}
