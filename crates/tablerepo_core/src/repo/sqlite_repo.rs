//! Generic CRUD repository over one SQLite table.
//!
//! # Responsibility
//! - Provide `select`/`select_all`/`insert`/`update`/`delete` for any
//!   `Persistable` record type.
//! - Execute generated statements on a borrowed connection or transaction
//!   and decode result rows into records.
//!
//! # Invariants
//! - Every call checks its `OpContext` first and can be interrupted while a
//!   statement runs.
//! - Writes re-read the stored row so server-side defaults are reflected.
//! - Decoding failures abort the whole call; no partial result is returned.

use crate::context::{InterruptGuard, OpContext};
use crate::metadata::{extract_columns, require_primary_key, TableMapping};
use crate::model::column::{ColumnDescriptor, ValueKind};
use crate::model::record::{Persistable, RowValues};
use crate::query::options::SelectOptions;
use crate::query::predicate::Predicate;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::statement::{
    bind_record, build_delete, build_insert, build_select, build_update, key_predicate, RowLimit,
    Statement,
};
use log::{debug, trace, warn};
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;
use std::time::Instant;

/// CRUD contract for one record type bound to one table.
pub trait Repository<T: Persistable> {
    /// Reads the first row matching `options`.
    ///
    /// Returns `RepoError::NotFound` when nothing matches.
    fn select(&self, ctx: &OpContext, options: &SelectOptions) -> RepoResult<T>;

    /// Reads every row matching `options`; an empty result is not an error.
    fn select_all(&self, ctx: &OpContext, options: &SelectOptions) -> RepoResult<Vec<T>>;

    /// Inserts `record` with a store-assigned primary key and returns the
    /// stored row.
    ///
    /// The row is located again through `last_insert_rowid()`, so tables
    /// declared `WITHOUT ROWID` are not supported; the re-select fails with
    /// `RepoError::Execution`.
    fn insert(&self, ctx: &OpContext, record: &T) -> RepoResult<T>;

    /// Writes every non-read-only column of `record`, located by primary
    /// key, and returns the stored row.
    fn update(&self, ctx: &OpContext, record: &T) -> RepoResult<T>;

    /// Deletes `record`'s row by primary key. Missing rows are not an error.
    fn delete(&self, ctx: &OpContext, record: &T) -> RepoResult<()>;
}

/// SQLite-backed repository borrowing a connection (usually a transaction).
pub struct SqliteRepository<'conn, T> {
    conn: &'conn Connection,
    table: String,
    _record: PhantomData<fn() -> T>,
}

impl<'conn, T: Persistable> SqliteRepository<'conn, T> {
    /// Binds `T` to `table` on `conn`, validating the mapping first.
    pub fn try_new(conn: &'conn Connection, table: &str) -> RepoResult<Self> {
        let mapping = TableMapping::of::<T>(table)?;
        Ok(Self::from_mapping(conn, &mapping))
    }

    pub(crate) fn from_mapping(conn: &'conn Connection, mapping: &TableMapping) -> Self {
        Self {
            conn,
            table: mapping.table.clone(),
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn query_records(
        &self,
        ctx: &OpContext,
        statement: &Statement,
        columns: &[ColumnDescriptor],
    ) -> RepoResult<Vec<T>> {
        ctx.check()?;
        trace!(
            "event=sql module=repo table={} sql={}",
            self.table,
            statement.sql
        );
        let _guard = InterruptGuard::install(self.conn, ctx);
        let mut stmt = self
            .conn
            .prepare(&statement.sql)
            .map_err(|err| ctx.map_sql_error(err))?;
        let mut rows = stmt
            .query(params_from_iter(statement.params.iter()))
            .map_err(|err| ctx.map_sql_error(err))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|err| ctx.map_sql_error(err))? {
            let values = RowValues::decode(row, columns)?;
            records.push(T::from_row(&values)?);
        }
        Ok(records)
    }

    fn execute(&self, ctx: &OpContext, statement: &Statement) -> RepoResult<usize> {
        ctx.check()?;
        trace!(
            "event=sql module=repo table={} sql={}",
            self.table,
            statement.sql
        );
        let _guard = InterruptGuard::install(self.conn, ctx);
        self.conn
            .execute(&statement.sql, params_from_iter(statement.params.iter()))
            .map_err(|err| ctx.map_sql_error(err))
    }

    fn select_one(&self, ctx: &OpContext, options: &SelectOptions) -> RepoResult<T> {
        let columns = extract_columns::<T>(false, false);
        let statement = build_select(&self.table, &columns, options, RowLimit::Single)?;
        self.query_records(ctx, &statement, &columns)?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound {
                table: self.table.clone(),
            })
    }

    fn select_many(&self, ctx: &OpContext, options: &SelectOptions) -> RepoResult<Vec<T>> {
        let columns = extract_columns::<T>(false, false);
        let statement = build_select(&self.table, &columns, options, RowLimit::Many)?;
        self.query_records(ctx, &statement, &columns)
    }

    fn insert_record(&self, ctx: &OpContext, record: &T) -> RepoResult<T> {
        let primary_key = require_primary_key::<T>(&self.table)?;
        let columns = extract_columns::<T>(true, true);
        let values = bind_record(record, &columns)?;
        let statement = build_insert(&self.table, &columns, values);
        self.execute(ctx, &statement)?;

        let generated = self.conn.last_insert_rowid();
        // INTEGER primary keys alias the rowid; other key types are located
        // through the rowid itself, which WITHOUT ROWID tables lack.
        let key = if primary_key.field_type.kind == ValueKind::Integer {
            Predicate::eq(primary_key.name, generated)
        } else {
            Predicate::eq("rowid", generated)
        };
        self.select_one(ctx, &SelectOptions::filtered(key))
    }

    fn update_record(&self, ctx: &OpContext, record: &T) -> RepoResult<T> {
        let primary_key = require_primary_key::<T>(&self.table)?;
        let columns = extract_columns::<T>(false, true);
        let key = key_predicate(record, &primary_key)?;
        let values = bind_record(record, &columns)?;
        let statement = build_update(&self.table, &columns, values, &key)?;
        self.execute(ctx, &statement)?;
        self.select_one(ctx, &SelectOptions::filtered(key))
    }

    fn delete_record(&self, ctx: &OpContext, record: &T) -> RepoResult<()> {
        let primary_key = require_primary_key::<T>(&self.table)?;
        let key = key_predicate(record, &primary_key)?;
        let statement = build_delete(&self.table, &key)?;
        self.execute(ctx, &statement)?;
        Ok(())
    }

    fn log_outcome<R>(&self, op: &str, started_at: Instant, result: &RepoResult<R>) {
        let duration_ms = started_at.elapsed().as_millis();
        match result {
            Ok(_) => debug!(
                "event=repo_{op} module=repo status=ok table={} duration_ms={duration_ms}",
                self.table
            ),
            Err(err) if err.is_not_found() => debug!(
                "event=repo_{op} module=repo status=not_found table={} duration_ms={duration_ms}",
                self.table
            ),
            Err(err) => warn!(
                "event=repo_{op} module=repo status=error table={} duration_ms={duration_ms} error={err}",
                self.table
            ),
        }
    }
}

impl<T: Persistable> Repository<T> for SqliteRepository<'_, T> {
    fn select(&self, ctx: &OpContext, options: &SelectOptions) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = self.select_one(ctx, options);
        self.log_outcome("select", started_at, &result);
        result
    }

    fn select_all(&self, ctx: &OpContext, options: &SelectOptions) -> RepoResult<Vec<T>> {
        let started_at = Instant::now();
        let result = self.select_many(ctx, options);
        self.log_outcome("select_all", started_at, &result);
        result
    }

    fn insert(&self, ctx: &OpContext, record: &T) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = self.insert_record(ctx, record);
        self.log_outcome("insert", started_at, &result);
        result
    }

    fn update(&self, ctx: &OpContext, record: &T) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = self.update_record(ctx, record);
        self.log_outcome("update", started_at, &result);
        result
    }

    fn delete(&self, ctx: &OpContext, record: &T) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.delete_record(ctx, record);
        self.log_outcome("delete", started_at, &result);
        result
    }
}
