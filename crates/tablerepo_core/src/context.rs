//! Caller-supplied cancellation and deadline context.
//!
//! # Responsibility
//! - Carry a shared cancel flag and an optional deadline into every
//!   repository call.
//! - Interrupt in-flight SQLite statements when the context is done.
//!
//! # Invariants
//! - Clones share one cancel flag; cancelling any clone cancels all.
//! - An interrupted statement surfaces as `RepoError::Cancelled`, never as an
//!   execution error.

use crate::repo::error::{RepoError, RepoResult};
use rusqlite::{Connection, ErrorCode};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of SQLite VM instructions between cancellation checks.
const PROGRESS_CHECK_INTERVAL_OPS: i32 = 1_000;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled by caller"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Cancellation/deadline context for repository operations.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context that is never done unless cancelled explicitly.
    pub fn background() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now; a timeout past the clock's range means
    /// no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::background(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this context is done, if it is.
    pub fn done_reason(&self) -> Option<CancelReason> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done_reason().is_some()
    }

    /// Fails with `RepoError::Cancelled` when the context is done.
    pub fn check(&self) -> RepoResult<()> {
        match self.done_reason() {
            Some(reason) => Err(RepoError::Cancelled { reason }),
            None => Ok(()),
        }
    }

    /// Maps a statement error, turning SQLite interrupts caused by this
    /// context into `RepoError::Cancelled`.
    pub(crate) fn map_sql_error(&self, err: rusqlite::Error) -> RepoError {
        let interrupted = matches!(
            err.sqlite_error_code(),
            Some(ErrorCode::OperationInterrupted)
        );
        match (interrupted, self.done_reason()) {
            (true, Some(reason)) => RepoError::Cancelled { reason },
            _ => RepoError::Execution(err),
        }
    }
}

/// Installs a progress handler that aborts statements once `ctx` is done;
/// the handler is removed when the guard drops.
pub(crate) struct InterruptGuard<'conn> {
    conn: &'conn Connection,
}

impl<'conn> InterruptGuard<'conn> {
    pub(crate) fn install(conn: &'conn Connection, ctx: &OpContext) -> Self {
        let watched = ctx.clone();
        conn.progress_handler(PROGRESS_CHECK_INTERVAL_OPS, Some(move || watched.is_done()));
        Self { conn }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelReason, InterruptGuard, OpContext};
    use crate::repo::error::RepoError;
    use rusqlite::Connection;
    use std::time::{Duration, Instant};

    #[test]
    fn clones_share_cancellation() {
        let ctx = OpContext::background();
        let clone = ctx.clone();
        assert!(ctx.check().is_ok());

        clone.cancel();
        let err = ctx.check().unwrap_err();
        assert!(matches!(
            err,
            RepoError::Cancelled {
                reason: CancelReason::Cancelled
            }
        ));
    }

    #[test]
    fn elapsed_deadline_reports_deadline_exceeded() {
        let ctx = OpContext::with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.done_reason(), Some(CancelReason::DeadlineExceeded));
    }

    #[test]
    fn unbounded_timeout_has_no_deadline() {
        let ctx = OpContext::with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn guard_interrupts_running_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let ctx = OpContext::with_timeout(Duration::from_millis(50));
        let _guard = InterruptGuard::install(&conn, &ctx);

        let err = conn
            .query_row(
                "WITH RECURSIVE counter(n) AS (
                    SELECT 1 UNION ALL SELECT n + 1 FROM counter WHERE n < 1000000000
                 )
                 SELECT count(*) FROM counter;",
                [],
                |row| row.get::<_, i64>(0),
            )
            .unwrap_err();
        let mapped = ctx.map_sql_error(err);
        assert!(matches!(
            mapped,
            RepoError::Cancelled {
                reason: CancelReason::DeadlineExceeded
            }
        ));
    }

    #[test]
    fn guard_drop_removes_handler() {
        let conn = Connection::open_in_memory().unwrap();
        let ctx = OpContext::background();
        ctx.cancel();
        {
            let _guard = InterruptGuard::install(&conn, &ctx);
        }
        let value: i64 = conn
            .query_row(
                "WITH RECURSIVE counter(n) AS (
                    SELECT 1 UNION ALL SELECT n + 1 FROM counter WHERE n < 10000
                 )
                 SELECT count(*) FROM counter;",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, 10000);
    }
}
