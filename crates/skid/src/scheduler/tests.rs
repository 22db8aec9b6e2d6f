use core::time::Duration;
use std::sync::Arc;

use portable_atomic::{AtomicUsize, Ordering};

use crate::{Error, PeriodicScheduler, TaskError, TaskFailure, TaskResult};

fn counting_action(counter: Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<TaskResult> {
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(()))
    }
}

#[test]
fn requires_a_runtime() {
    let err = PeriodicScheduler::new(
        "orphan",
        || async { Ok::<(), TaskError>(()) },
        Duration::from_millis(10),
        true,
    )
    .unwrap_err();
    assert_eq!(err, Error::RuntimeUnavailable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_repeatedly_once_started() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = PeriodicScheduler::new(
        "repeat",
        counting_action(Arc::clone(&counter)),
        Duration::from_millis(5),
        false,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(!scheduler.is_running());

    scheduler.start();
    scheduler.start();
    assert!(scheduler.is_running());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(counter.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_overlaps_invocations() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let scheduler = {
        let in_flight = Arc::clone(&in_flight);
        let max_in_flight = Arc::clone(&max_in_flight);
        let runs = Arc::clone(&runs);
        Arc::new(
            PeriodicScheduler::new(
                "slow",
                move || {
                    let in_flight = Arc::clone(&in_flight);
                    let max_in_flight = Arc::clone(&max_in_flight);
                    let runs = Arc::clone(&runs);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(40)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), TaskError>(())
                    }
                },
                Duration::from_millis(1),
                false,
            )
            .unwrap(),
        )
    };

    let first = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.trigger().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(scheduler.is_busy());
    assert!(!scheduler.trigger().await);
    assert!(first.await.unwrap());

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.dispose();

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert!(runs.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_trigger_releases_the_busy_flag() {
    let runs = Arc::new(AtomicUsize::new(0));
    let scheduler = {
        let runs = Arc::clone(&runs);
        PeriodicScheduler::new(
            "abandoned",
            move || {
                let runs = Arc::clone(&runs);
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), TaskError>(())
                }
            },
            Duration::from_millis(5),
            false,
        )
        .unwrap()
    };

    let abandoned = tokio::time::timeout(Duration::from_millis(10), scheduler.trigger()).await;
    assert!(abandoned.is_err());
    assert!(!scheduler.is_busy());
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(runs.load(Ordering::SeqCst) >= 2);
    scheduler.dispose();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_are_reported_and_do_not_stop_the_schedule() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let panics = Arc::new(AtomicUsize::new(0));

    let _scheduler = {
        let attempts = Arc::clone(&attempts);
        let errors = Arc::clone(&errors);
        let panics = Arc::clone(&panics);
        PeriodicScheduler::with_failure_handler(
            "flaky",
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    let result: TaskResult = if attempt % 2 == 0 {
                        Err("boom".into())
                    } else {
                        panic!("kaboom")
                    };
                    result
                }
            },
            Duration::from_millis(5),
            move |failure| match failure {
                TaskFailure::Failed(_) => {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
                TaskFailure::Panicked => {
                    panics.fetch_add(1, Ordering::SeqCst);
                }
            },
            true,
        )
        .unwrap()
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(errors.load(Ordering::SeqCst) >= 2);
    assert!(panics.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dispose_is_idempotent_and_final() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = PeriodicScheduler::new(
        "disposable",
        counting_action(Arc::clone(&counter)),
        Duration::from_millis(5),
        true,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    scheduler.dispose();
    scheduler.dispose();
    assert!(scheduler.is_disposed());
    assert!(!scheduler.is_running());

    // let a run that was already past its sleep finish
    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_dispose = counter.load(Ordering::SeqCst);

    scheduler.start();
    assert!(!scheduler.trigger().await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(counter.load(Ordering::SeqCst), after_dispose);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_then_start_resumes() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = PeriodicScheduler::new(
        "restartable",
        counting_action(Arc::clone(&counter)),
        Duration::from_millis(5),
        true,
    )
    .unwrap();

    scheduler.stop();
    assert!(!scheduler.is_running());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stopped_at = counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(counter.load(Ordering::SeqCst), stopped_at);

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(counter.load(Ordering::SeqCst) > stopped_at);
}
