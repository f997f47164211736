//! SQL statement assembly for single-table CRUD.
//!
//! # Responsibility
//! - Combine column metadata, select options and predicates into complete
//!   statements with `?` placeholders.
//! - Marshal record fields into bound values in placeholder order.
//!
//! # Invariants
//! - Only validated identifiers are written into SQL text; every value is a
//!   bound parameter.
//! - `params` order always matches placeholder order in `sql`.

use crate::model::column::ColumnDescriptor;
use crate::model::record::{EncodeError, FieldValue, Persistable};
use crate::query::options::SelectOptions;
use crate::query::predicate::{Literal, Predicate};
use crate::repo::error::{ConfigError, RepoResult};
use rusqlite::types::Value;

/// Generated statement text plus its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Row bound for a `SELECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// Always `LIMIT 1`; `SelectOptions::limit` is ignored.
    Single,
    /// Honors `SelectOptions::limit`.
    Many,
}

/// Builds `SELECT <cols> FROM <table> [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
pub fn build_select(
    table: &str,
    columns: &[ColumnDescriptor],
    options: &SelectOptions,
    row_limit: RowLimit,
) -> RepoResult<Statement> {
    let mut sql = format!("SELECT {} FROM {table}", column_list(columns));
    let mut params = Vec::new();

    if let Some(filter) = options.filter.as_ref() {
        let rendered = filter.render()?;
        sql.push_str(" WHERE ");
        sql.push_str(&rendered.sql);
        params.extend(rendered.params);
    }

    if let Some(order) = options.order_by.as_ref() {
        // Only mapped columns may reach SQL text.
        let known = columns.iter().any(|column| column.name == order.column);
        if !known {
            return Err(ConfigError::UnknownColumn {
                table: table.to_string(),
                column: order.column.clone(),
            }
            .into());
        }
        sql.push_str(&format!(
            " ORDER BY {} {}",
            order.column,
            order.direction.as_sql()
        ));
    }

    match (row_limit, options.limit, options.offset) {
        (RowLimit::Single, _, offset) => {
            sql.push_str(" LIMIT 1");
            if let Some(offset) = offset {
                sql.push_str(" OFFSET ?");
                params.push(Value::Integer(i64::from(offset)));
            }
        }
        (RowLimit::Many, Some(limit), offset) => {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::from(limit)));
            if let Some(offset) = offset {
                sql.push_str(" OFFSET ?");
                params.push(Value::Integer(i64::from(offset)));
            }
        }
        (RowLimit::Many, None, Some(offset)) => {
            // SQLite only accepts OFFSET after a LIMIT clause.
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(Value::Integer(i64::from(offset)));
        }
        (RowLimit::Many, None, None) => {}
    }

    Ok(Statement { sql, params })
}

/// Builds `INSERT INTO <table> (<cols>) VALUES (?, ...)`.
pub fn build_insert(table: &str, columns: &[ColumnDescriptor], values: Vec<Value>) -> Statement {
    if columns.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {table} DEFAULT VALUES"),
            params: Vec::new(),
        };
    }

    Statement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            column_list(columns),
            placeholders(columns.len())
        ),
        params: values,
    }
}

/// Builds `UPDATE <table> SET c1 = ?, ... WHERE <key predicate>`.
///
/// Fails with `NoWritableColumns` when `columns` is empty.
pub fn build_update(
    table: &str,
    columns: &[ColumnDescriptor],
    values: Vec<Value>,
    key: &Predicate,
) -> RepoResult<Statement> {
    if columns.is_empty() {
        return Err(ConfigError::NoWritableColumns {
            table: table.to_string(),
        }
        .into());
    }
    let assignments = columns
        .iter()
        .map(|column| format!("{} = ?", column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let rendered = key.render()?;

    let mut params = values;
    params.extend(rendered.params);
    Ok(Statement {
        sql: format!("UPDATE {table} SET {assignments} WHERE {}", rendered.sql),
        params,
    })
}

/// Builds `DELETE FROM <table> WHERE <key predicate>`.
pub fn build_delete(table: &str, key: &Predicate) -> RepoResult<Statement> {
    let rendered = key.render()?;
    Ok(Statement {
        sql: format!("DELETE FROM {table} WHERE {}", rendered.sql),
        params: rendered.params,
    })
}

/// Marshals `record`'s values for `columns`, in column order.
pub fn bind_record<T: Persistable>(
    record: &T,
    columns: &[ColumnDescriptor],
) -> Result<Vec<Value>, EncodeError> {
    columns
        .iter()
        .map(|column| record.field_value(column.field)?.into_sql(column))
        .collect()
}

/// Exact-match predicate locating `record`'s row by primary key.
pub fn key_predicate<T: Persistable>(
    record: &T,
    primary_key: &ColumnDescriptor,
) -> Result<Predicate, EncodeError> {
    let literal = match record.field_value(primary_key.field)? {
        FieldValue::Integer(value) => Literal::Integer(value),
        FieldValue::Text(value) => Literal::Text(value),
        FieldValue::Real(value) => Literal::Real(value),
        FieldValue::Boolean(value) => Literal::Boolean(value),
        other => {
            return Err(EncodeError::KindMismatch {
                field: primary_key.field,
                expected: primary_key.field_type.kind,
                found: other.type_name(),
            });
        }
    };
    Ok(Predicate::eq(primary_key.name, literal))
}

fn column_list(columns: &[ColumnDescriptor]) -> String {
    columns
        .iter()
        .map(|column| column.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::{build_delete, build_insert, build_select, build_update, RowLimit};
    use crate::model::column::{ColumnDescriptor, FieldSpec, FieldType};
    use crate::query::options::{SelectOptions, SortDirection};
    use crate::query::predicate::Predicate;
    use crate::repo::error::{ConfigError, RepoError};
    use rusqlite::types::Value;

    fn columns() -> Vec<ColumnDescriptor> {
        [
            FieldSpec::new("id", FieldType::INTEGER)
                .column("id")
                .scalar()
                .primary_key(),
            FieldSpec::new("name", FieldType::TEXT).column("name").scalar(),
        ]
        .iter()
        .filter_map(|spec| spec.descriptor())
        .collect()
    }

    #[test]
    fn single_row_select_ignores_limit_and_binds_offset() {
        let options = SelectOptions::filtered(Predicate::eq("name", "a"))
            .order_by("id", SortDirection::Descending)
            .limit(10)
            .offset(2);
        let statement = build_select("widgets", &columns(), &options, RowLimit::Single).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT id, name FROM widgets WHERE (name = ?) ORDER BY id DESC LIMIT 1 OFFSET ?"
        );
        assert_eq!(
            statement.params,
            vec![Value::Text("a".to_string()), Value::Integer(2)]
        );
    }

    #[test]
    fn many_rows_select_handles_offset_without_limit() {
        let options = SelectOptions::new().offset(5);
        let statement = build_select("widgets", &columns(), &options, RowLimit::Many).unwrap();
        assert_eq!(statement.sql, "SELECT id, name FROM widgets LIMIT -1 OFFSET ?");

        let unbounded =
            build_select("widgets", &columns(), &SelectOptions::new(), RowLimit::Many).unwrap();
        assert_eq!(unbounded.sql, "SELECT id, name FROM widgets");
        assert!(unbounded.params.is_empty());
    }

    #[test]
    fn order_by_rejects_unmapped_column() {
        let options = SelectOptions::new().order_by("id; DROP TABLE widgets", SortDirection::Ascending);
        let err = build_select("widgets", &columns(), &options, RowLimit::Many).unwrap_err();
        assert!(matches!(
            err,
            RepoError::Config(ConfigError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn insert_update_delete_shapes() {
        let cols = columns();
        let insert = build_insert(
            "widgets",
            &cols[1..],
            vec![Value::Text("a".to_string())],
        );
        assert_eq!(insert.sql, "INSERT INTO widgets (name) VALUES (?)");

        let empty = build_insert("widgets", &[], Vec::new());
        assert_eq!(empty.sql, "INSERT INTO widgets DEFAULT VALUES");

        let key = Predicate::eq("id", 7);
        let update = build_update(
            "widgets",
            &cols,
            vec![Value::Integer(7), Value::Text("b".to_string())],
            &key,
        )
        .unwrap();
        assert_eq!(update.sql, "UPDATE widgets SET id = ?, name = ? WHERE (id = ?)");
        assert_eq!(
            update.params,
            vec![
                Value::Integer(7),
                Value::Text("b".to_string()),
                Value::Integer(7)
            ]
        );

        let delete = build_delete("widgets", &key).unwrap();
        assert_eq!(delete.sql, "DELETE FROM widgets WHERE (id = ?)");
        assert_eq!(delete.params, vec![Value::Integer(7)]);
    }

    #[test]
    fn update_without_writable_columns_is_rejected() {
        let err = build_update("widgets", &[], Vec::new(), &Predicate::eq("id", 7)).unwrap_err();
        assert!(matches!(
            err,
            RepoError::Config(ConfigError::NoWritableColumns { ref table }) if table == "widgets"
        ));
    }
}
