mod common;

use common::{Fixture, Widget};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tablerepo_core::{
    CancelReason, ConfigError, ConnectionTarget, OpContext, Predicate, RepoError, Repository,
    RepositoryRegistry, SelectOptions,
};

#[test]
fn commit_persists_across_units_of_work() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::background();

    registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            repo.insert(ctx, &Widget::new("kept", &["a"]))?;
            repo.insert(ctx, &Widget::new("also kept", &[]))?;
            Ok(())
        })
        .unwrap();

    let names = registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            repo.select_all(ctx, &SelectOptions::new())
        })
        .unwrap()
        .into_iter()
        .map(|widget| widget.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["kept", "also kept"]);
}

#[test]
fn callback_error_rolls_back_and_is_returned() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::background();

    let err = registry
        .with_repository::<Widget, (), _>(&ctx, |ctx, repo| {
            repo.insert(ctx, &Widget::new("transient", &["x"]))?;
            Err(RepoError::callback("abort after insert"))
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::Callback(ref inner) if inner.to_string() == "abort after insert"));

    let err = registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            repo.select(
                ctx,
                &SelectOptions::filtered(Predicate::eq("name", "transient")),
            )
        })
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fixture.count_rows(), 0);
}

#[test]
fn repository_error_inside_callback_rolls_back_earlier_writes() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::background();

    let err = registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            let stored = repo.insert(ctx, &Widget::new("first", &[]))?;
            repo.select(ctx, &SelectOptions::filtered(Predicate::eq("id", stored.id + 100)))
        })
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fixture.count_rows(), 0);
}

#[test]
fn panicking_callback_leaves_no_committed_rows() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::background();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        registry.with_repository::<Widget, (), _>(&ctx, |ctx, repo| {
            repo.insert(ctx, &Widget::new("half written", &[]))?;
            panic!("callback blew up");
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(fixture.count_rows(), 0);

    // The database stays usable afterwards.
    registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            repo.insert(ctx, &Widget::new("after panic", &[]))
        })
        .unwrap();
    assert_eq!(fixture.count_rows(), 1);
}

#[test]
fn unregistered_type_is_rejected() {
    let registry = RepositoryRegistry::new();
    let mut called = false;

    let err = registry
        .with_repository::<Widget, _, _>(&OpContext::background(), |_, _| {
            called = true;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Config(ConfigError::NotRegistered { .. })
    ));
    assert!(!called);
}

#[test]
fn cancelled_context_fails_before_callback_runs() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::background();
    ctx.cancel();
    let mut called = false;

    let err = registry
        .with_repository::<Widget, _, _>(&ctx, |_, _| {
            called = true;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Cancelled {
            reason: CancelReason::Cancelled
        }
    ));
    assert!(!called);
}

#[test]
fn cancellation_inside_callback_stops_later_operations() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::background();

    let err = registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            repo.insert(ctx, &Widget::new("before cancel", &[]))?;
            ctx.cancel();
            repo.insert(ctx, &Widget::new("after cancel", &[]))
        })
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fixture.count_rows(), 0);
}

#[test]
fn expired_deadline_reports_deadline_exceeded() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let ctx = OpContext::with_deadline(Instant::now() - Duration::from_millis(1));

    let err = registry
        .with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
            repo.select_all(ctx, &SelectOptions::new())
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Cancelled {
            reason: CancelReason::DeadlineExceeded
        }
    ));
}

#[test]
fn unreachable_target_surfaces_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no_such_dir").join("db.sqlite3");
    let mut registry = RepositoryRegistry::new();
    registry
        .register::<Widget>(ConnectionTarget::file(missing), "widgets")
        .unwrap();

    let err = registry
        .with_repository::<Widget, _, _>(&OpContext::background(), |ctx, repo| {
            repo.select_all(ctx, &SelectOptions::new())
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::Connection(_)));
}

#[test]
fn registry_is_shareable_across_threads() {
    let fixture = Fixture::new();
    let registry = std::sync::Arc::new(fixture.registry());
    registry
        .with_repository::<Widget, _, _>(&OpContext::background(), |ctx, repo| {
            repo.insert(ctx, &Widget::new("shared", &["t"]))
        })
        .unwrap();

    let handles = (0..4)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry.with_repository::<Widget, _, _>(&OpContext::background(), |ctx, repo| {
                    repo.select(ctx, &SelectOptions::filtered(Predicate::eq("name", "shared")))
                })
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        let widget = handle.join().unwrap().unwrap();
        assert_eq!(widget.tags, vec!["t".to_string()]);
    }
}
