//! Transaction-scoped unit of work.
//!
//! # Responsibility
//! - Open a connection for a registered record type, begin a transaction and
//!   hand the caller a repository bound to it.
//! - Commit when the callback succeeds and roll back otherwise.
//!
//! # Invariants
//! - The transaction is concluded before `with_repository` returns, on every
//!   path. A panicking callback unwinds through the transaction, which rolls
//!   back on drop.
//! - A failed rollback is reported together with the callback error.
//! - Each call uses its own connection; nothing is shared between calls.

use crate::context::OpContext;
use crate::db::{open_target, DbError};
use crate::model::record::Persistable;
use crate::registry::RepositoryRegistry;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sqlite_repo::SqliteRepository;
use log::{error, info, warn};
use std::time::Instant;
use uuid::Uuid;

impl RepositoryRegistry {
    /// Runs `f` with a repository for `T` inside one transaction.
    ///
    /// # Errors
    /// - `Config(NotRegistered)` when `T` has no registration.
    /// - `Cancelled` when `ctx` is already done.
    /// - `Connection` when opening the connection or transaction fails.
    /// - The callback's own error after a successful rollback.
    /// - `Rollback { source, cause }` when rollback fails after a callback error.
    /// - `Commit` when the commit fails; the transaction is rolled back.
    pub fn with_repository<T, R, F>(&self, ctx: &OpContext, f: F) -> RepoResult<R>
    where
        T: Persistable + 'static,
        F: FnOnce(&OpContext, &SqliteRepository<'_, T>) -> RepoResult<R>,
    {
        let registration = self.registration::<T>()?;
        ctx.check()?;

        let uow_id = Uuid::new_v4();
        let table = registration.table();
        let started_at = Instant::now();
        info!("event=uow_begin module=uow status=start uow_id={uow_id} table={table}");

        let mut conn = open_target(&registration.target).map_err(RepoError::Connection)?;
        let tx = match conn.transaction() {
            Ok(tx) => tx,
            Err(err) => {
                error!(
                    "event=uow_begin module=uow status=error uow_id={uow_id} table={table} error_code=tx_begin_failed error={err}"
                );
                return Err(RepoError::Connection(DbError::Sqlite(err)));
            }
        };

        let outcome = {
            let repo = SqliteRepository::from_mapping(&tx, &registration.mapping);
            f(ctx, &repo)
        };

        match outcome {
            Ok(value) => match tx.commit() {
                Ok(()) => {
                    info!(
                        "event=uow_commit module=uow status=ok uow_id={uow_id} table={table} duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    Ok(value)
                }
                Err(err) => {
                    error!(
                        "event=uow_commit module=uow status=error uow_id={uow_id} table={table} duration_ms={} error_code=commit_failed error={err}",
                        started_at.elapsed().as_millis()
                    );
                    Err(RepoError::Commit(err))
                }
            },
            Err(cause) => match tx.rollback() {
                Ok(()) => {
                    warn!(
                        "event=uow_rollback module=uow status=ok uow_id={uow_id} table={table} duration_ms={} cause={cause}",
                        started_at.elapsed().as_millis()
                    );
                    Err(cause)
                }
                Err(source) => {
                    error!(
                        "event=uow_rollback module=uow status=error uow_id={uow_id} table={table} duration_ms={} error_code=rollback_failed error={source} cause={cause}",
                        started_at.elapsed().as_millis()
                    );
                    Err(RepoError::Rollback {
                        source,
                        cause: Box::new(cause),
                    })
                }
            },
        }
    }
}
