use core::time::Duration;
use std::sync::Arc;

use portable_atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::error::TryRecvError;

use crate::{ClockConfig, DriftCheck, HybridClock, TimeSource, TimestampCache, WallClock};

struct MockWall {
    nanos: AtomicU64,
}

impl MockWall {
    fn at(now: Duration) -> Arc<Self> {
        Arc::new(Self {
            nanos: AtomicU64::new(now.as_nanos() as u64),
        })
    }

    fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl WallClock for MockWall {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

const JUNE_2025: Duration = Duration::from_secs(1_748_736_000);

fn mock_clock() -> (Arc<MockWall>, HybridClock<Arc<MockWall>>) {
    let wall = MockWall::at(JUNE_2025);
    let clock = HybridClock::new(Arc::clone(&wall), ClockConfig::default());
    (wall, clock)
}

#[test]
fn starts_at_the_wall_clock_and_never_goes_backward() {
    let (_, clock) = mock_clock();
    let first = clock.now();
    assert!(first >= JUNE_2025);
    assert!(first - JUNE_2025 < Duration::from_secs(1));

    let mut last = first;
    for _ in 0..1_000 {
        let now = clock.now();
        assert!(now >= last);
        last = now;
    }
}

#[tokio::test]
async fn drift_inside_grace_band_is_ignored() {
    let (wall, clock) = mock_clock();
    let mut events = clock.subscribe();

    wall.set(clock.now() + Duration::from_millis(2));
    assert!(matches!(clock.check_drift().await, DriftCheck::InBand { .. }));

    wall.set(clock.now().saturating_sub(Duration::from_millis(2)));
    assert!(matches!(clock.check_drift().await, DriftCheck::InBand { .. }));

    assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    assert!(!clock.shutdown_requested());
}

#[tokio::test]
async fn wall_clock_ahead_reanchors_once() {
    let (wall, clock) = mock_clock();
    let mut events = clock.subscribe();

    let ahead = clock.now() + Duration::from_secs(30);
    wall.set(ahead);

    let DriftCheck::Resynced(info) = clock.check_drift().await else {
        panic!("expected a re-anchor");
    };
    assert!(info.drift_nanos > 29_000_000_000);
    assert_eq!(info.system_time, ahead);

    assert_eq!(events.try_recv().unwrap(), info);
    assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    assert!(!clock.shutdown_requested());

    let now = clock.now();
    assert!(now >= ahead);
    assert!(now - ahead < Duration::from_secs(1));
}

#[tokio::test]
async fn monotonic_ahead_waits_and_never_reports_earlier_time() {
    let (wall, clock) = mock_clock();
    let before = clock.now();
    wall.set(before.saturating_sub(Duration::from_millis(50)));

    let started = std::time::Instant::now();
    let DriftCheck::Resynced(info) = clock.check_drift().await else {
        panic!("expected a re-anchor");
    };
    assert!(info.drift_nanos < 0);
    assert!(started.elapsed() >= Duration::from_millis(45));
    assert!(clock.now() >= before);
}

#[tokio::test]
async fn catastrophic_drift_latches_shutdown() {
    let (wall, clock) = mock_clock();
    let mut events = clock.subscribe();
    let reported = clock.now();

    wall.set(reported + Duration::from_secs(90));
    assert!(matches!(
        clock.check_drift().await,
        DriftCheck::Catastrophic(_)
    ));
    assert!(clock.shutdown_requested());
    // the clock is not moved
    assert!(clock.now() - reported < Duration::from_secs(1));
    assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);

    wall.set(clock.now());
    assert!(matches!(clock.check_drift().await, DriftCheck::InBand { .. }));
    assert!(clock.shutdown_requested());
}

#[tokio::test]
async fn catastrophic_drift_backward_latches_shutdown() {
    let (wall, clock) = mock_clock();
    wall.set(clock.now() - Duration::from_secs(61));
    assert!(matches!(
        clock.check_drift().await,
        DriftCheck::Catastrophic(_)
    ));
    assert!(clock.shutdown_requested());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_drift_check_resyncs() {
    let wall = MockWall::at(JUNE_2025);
    let config = ClockConfig {
        drift_check_period: Duration::from_millis(10),
        ..ClockConfig::default()
    };
    let clock = HybridClock::start(Arc::clone(&wall), config).unwrap();
    let mut events = clock.subscribe();

    wall.set(clock.now() + Duration::from_secs(5));
    let info = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(info.drift_nanos > 4_000_000_000);
    clock.stop();
}

#[test]
fn cache_truncates_to_whole_seconds() {
    let wall = MockWall::at(JUNE_2025 + Duration::from_millis(750));
    let clock = HybridClock::new(Arc::clone(&wall), ClockConfig::default());
    let cache = TimestampCache::new(clock, Duration::from_millis(10));

    assert_eq!(cache.current_seconds(), JUNE_2025.as_secs() as i64);
    assert_eq!(
        cache.current_timestamp(crate::DEFAULT_EPOCH),
        (JUNE_2025 - crate::DEFAULT_EPOCH).as_secs() as i64
    );
    assert_eq!(
        cache.current_timestamp(JUNE_2025 + Duration::from_secs(10)),
        -10
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cache_follows_the_clock_in_the_background() {
    let (wall, clock) = mock_clock();
    let cache = TimestampCache::start(clock.clone(), Duration::from_millis(5)).unwrap();
    let initial = cache.current_seconds();

    wall.set(clock.now() + Duration::from_secs(3));
    assert!(matches!(clock.check_drift().await, DriftCheck::Resynced(_)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.current_seconds() >= initial + 2);
    cache.stop();
}

#[tokio::test]
async fn system_clock_tracks_real_time() {
    let clock = HybridClock::system(ClockConfig::default()).unwrap();
    let real = crate::SystemClock.now();
    let reported = clock.now();
    let diff = if reported > real { reported - real } else { real - reported };
    assert!(diff < Duration::from_secs(1));
    clock.stop();
}
