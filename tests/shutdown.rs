//! Shutdown coordinator behavior: ordering, idempotence, deadline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use estate_lifecycle::config::ShutdownConfig;
use estate_lifecycle::lifecycle::{
    CleanupTask, ShutdownCoordinator, ShutdownOutcome, ShutdownPhase, ShutdownState,
    TerminationReason,
};

mod common;

use common::{EventLog, FakeDrain, FakeResource, RecordingExit};

fn shutdown_config(deadline_ms: u64, drain_grace_ms: u64) -> ShutdownConfig {
    ShutdownConfig {
        deadline_ms,
        drain_grace_ms,
    }
}

fn logged_task(name: &'static str, log: EventLog) -> CleanupTask {
    CleanupTask::new(name, move || {
        let log = log.clone();
        async move {
            log.push(format!("cleanup:{name}"));
            anyhow::Ok(())
        }
    })
}

#[tokio::test]
async fn sequence_runs_in_order() {
    let log = EventLog::default();
    let exit = Arc::new(RecordingExit::default());
    let state = ShutdownState::new();

    let mut coordinator =
        ShutdownCoordinator::new(state.clone(), &shutdown_config(5_000, 100), exit.clone());
    coordinator.set_drain_target(FakeDrain::new(log.clone()));
    coordinator.register_cleanup(logged_task("search-index", log.clone()));
    coordinator.register_resource(FakeResource::new("database", log.clone()));
    coordinator.register_resource(FakeResource::new("cache", log.clone()));

    coordinator.trigger().trigger(TerminationReason::Signal("SIGTERM"));
    let outcome = coordinator.run().await;

    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert_eq!(exit.codes(), vec![0]);
    assert_eq!(state.phase(), ShutdownPhase::Terminated);

    let stop = log.position("stop_accepting").unwrap();
    let drain = log.position("drain").unwrap();
    let cleanup = log.position("cleanup:search-index").unwrap();
    let database = log.position("disconnect:database").unwrap();
    let cache = log.position("disconnect:cache").unwrap();
    assert!(stop < drain);
    assert!(drain < cleanup);
    assert!(cleanup < database && cleanup < cache);
}

#[tokio::test]
async fn repeated_triggers_run_the_sequence_once() {
    let log = EventLog::default();
    let exit = Arc::new(RecordingExit::default());
    let runs = Arc::new(AtomicUsize::new(0));
    let drain = FakeDrain::new(log.clone());

    let mut coordinator =
        ShutdownCoordinator::new(ShutdownState::new(), &shutdown_config(5_000, 100), exit.clone());
    coordinator.set_drain_target(drain.clone());
    let counter = runs.clone();
    coordinator.register_cleanup(CleanupTask::new("notifications", move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    }));

    let trigger = coordinator.trigger();
    assert!(trigger.trigger(TerminationReason::Signal("SIGTERM")));
    assert!(!trigger.trigger(TerminationReason::Signal("SIGTERM")));
    assert!(!trigger.trigger(TerminationReason::Panic("late".into())));

    coordinator.run().await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(drain.stops.load(Ordering::SeqCst), 1);
    assert_eq!(exit.codes(), vec![0]);
}

#[tokio::test]
async fn concurrent_triggers_have_one_winner() {
    let exit = Arc::new(RecordingExit::default());
    let coordinator =
        ShutdownCoordinator::new(ShutdownState::new(), &shutdown_config(5_000, 100), exit.clone());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let trigger = coordinator.trigger();
            tokio::spawn(async move { trigger.trigger(TerminationReason::Fatal(format!("task {i}"))) })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    coordinator.run().await;
    assert_eq!(exit.codes(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_the_sequence_and_exits_nonzero() {
    let log = EventLog::default();
    let exit = Arc::new(RecordingExit::default());
    let database = FakeResource::new("database", log.clone());

    let mut coordinator =
        ShutdownCoordinator::new(ShutdownState::new(), &shutdown_config(2_000, 100), exit.clone());
    coordinator.register_cleanup(CleanupTask::new("stuck-upload", || async {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        anyhow::Ok(())
    }));
    coordinator.register_resource(database.clone());

    coordinator.trigger().trigger(TerminationReason::Signal("SIGTERM"));
    let started = tokio::time::Instant::now();
    let outcome = coordinator.run().await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, ShutdownOutcome::DeadlineExceeded);
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2_500));
    assert_eq!(exit.codes(), vec![1]);
    assert_eq!(database.disconnect_count(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(database.disconnect_count(), 0);
}

#[tokio::test]
async fn failing_cleanup_does_not_stop_the_others() {
    let log = EventLog::default();
    let exit = Arc::new(RecordingExit::default());

    let mut coordinator =
        ShutdownCoordinator::new(ShutdownState::new(), &shutdown_config(5_000, 100), exit.clone());
    coordinator.register_cleanup(CleanupTask::new("mailer", || async {
        Err::<(), _>(anyhow::anyhow!("smtp connection reset"))
    }));
    coordinator.register_cleanup(logged_task("image-cache", log.clone()));
    coordinator.register_resource(FakeResource::failing("cache", log.clone()));
    coordinator.register_resource(FakeResource::new("database", log.clone()));

    coordinator.trigger().trigger(TerminationReason::Signal("SIGINT"));
    let outcome = coordinator.run().await;

    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert_eq!(exit.codes(), vec![0]);
    assert!(log.position("cleanup:image-cache").is_some());
    assert!(log.position("disconnect:cache").is_some());
    assert!(log.position("disconnect:database").is_some());
}
