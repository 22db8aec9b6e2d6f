use core::time::Duration;
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use portable_atomic::{AtomicI64, Ordering};

use crate::{
    DEFAULT_EPOCH, Error, IdGenStatus, MAX_APP_ID, MAX_APP_INSTANCE_ID, MAX_RESIDUE_SECONDS,
    MAX_SEQUENCE, SourceKnownId, SourceKnownIdGenerator, TimeSource,
};

const JUNE_2025: i64 = 1_748_736_000;
const BACKOFF: Duration = Duration::from_millis(5);

struct MockTime {
    seconds: AtomicI64,
}

impl MockTime {
    fn at(seconds: i64) -> Arc<Self> {
        Arc::new(Self {
            seconds: AtomicI64::new(seconds),
        })
    }
}

impl TimeSource for MockTime {
    fn current_seconds(&self) -> i64 {
        self.seconds.load(Ordering::SeqCst)
    }
}

fn generator(
    time: &Arc<MockTime>,
    app_id: u8,
    instance: u8,
) -> SourceKnownIdGenerator<u16, Arc<MockTime>> {
    SourceKnownIdGenerator::new(Arc::clone(time), BACKOFF, app_id, instance, DEFAULT_EPOCH)
        .unwrap()
}

#[test]
fn june_2025_example_round_trips() {
    let time = MockTime::at(JUNE_2025);
    let generator = generator(&time, 0, 0);

    let id = generator.generate(&1, 5, 12, DEFAULT_EPOCH).unwrap();
    assert!(id.id() < 0);

    let parsed = SourceKnownId::parse(id.id(), DEFAULT_EPOCH).unwrap();
    assert_eq!(parsed.app_id(), 5);
    assert_eq!(parsed.app_instance_id(), 12);
    assert_eq!(parsed.sequence(), 0);
    assert_eq!(parsed.created_at(), Duration::from_secs(JUNE_2025 as u64));
    assert_eq!(parsed.residue_seconds(), 151 * 86_400);
    assert_eq!(parsed, id);
}

#[test]
fn boundary_components_round_trip() {
    for (residue, app_id, instance, sequence) in [
        (0, 0, 0, 0),
        (MAX_RESIDUE_SECONDS, MAX_APP_ID, MAX_APP_INSTANCE_ID, MAX_SEQUENCE),
        (1, MAX_APP_ID, 0, MAX_SEQUENCE),
        (MAX_RESIDUE_SECONDS - 1, 0, MAX_APP_INSTANCE_ID, 1),
    ] {
        let id = SourceKnownId::from_components(residue, app_id, instance, sequence, DEFAULT_EPOCH)
            .unwrap();
        let parsed = SourceKnownId::parse(id.id(), DEFAULT_EPOCH).unwrap();
        assert_eq!(parsed.residue_seconds(), residue);
        assert_eq!(parsed.app_id(), app_id);
        assert_eq!(parsed.app_instance_id(), instance);
        assert_eq!(parsed.sequence(), sequence);
    }
}

#[test]
fn layout_matches_the_documented_bit_positions() {
    let id = SourceKnownId::from_components(1, 1, 1, 1, DEFAULT_EPOCH).unwrap();
    let expected = (1u64 << 63) | (1 << 32) | (1 << 26) | (1 << 21) | 1;
    assert_eq!(id.id() as u64, expected);
}

#[test]
fn parse_uses_the_given_epoch() {
    let id = SourceKnownId::from_components(10, 1, 2, 3, DEFAULT_EPOCH).unwrap();
    let shifted = Duration::from_secs(1_000);
    let parsed = SourceKnownId::parse(id.id(), shifted).unwrap();
    assert_eq!(parsed.created_at(), Duration::from_secs(1_010));
    assert_eq!(parsed.app_id(), 1);
}

#[test]
fn positive_values_are_not_source_known_ids() {
    assert_eq!(
        SourceKnownId::parse(42, DEFAULT_EPOCH).unwrap_err(),
        Error::InvalidId(42)
    );
}

#[test]
fn creation_time_past_the_duration_range_is_an_error() {
    assert_eq!(
        SourceKnownId::from_components(1, 0, 0, 0, Duration::MAX).unwrap_err(),
        Error::TimestampOutOfRange { seconds: 1 }
    );

    let id = SourceKnownId::from_components(1, 0, 0, 0, DEFAULT_EPOCH).unwrap();
    assert_eq!(
        SourceKnownId::parse(id.id(), Duration::MAX).unwrap_err(),
        Error::TimestampOutOfRange { seconds: 1 }
    );
    assert_eq!(
        SourceKnownId::parse(id.id(), Duration::MAX - Duration::from_secs(1))
            .unwrap()
            .created_at(),
        Duration::MAX
    );
}

#[test]
fn later_seconds_order_after_any_source() {
    let earlier = SourceKnownId::from_components(
        100,
        MAX_APP_ID,
        MAX_APP_INSTANCE_ID,
        MAX_SEQUENCE,
        DEFAULT_EPOCH,
    )
    .unwrap();
    let later = SourceKnownId::from_components(101, 0, 0, 0, DEFAULT_EPOCH).unwrap();
    assert!(earlier < later);
    assert!(earlier.id() < later.id());
}

#[test]
fn sequential_ids_strictly_increase_across_seconds() {
    let time = MockTime::at(JUNE_2025);
    let generator = generator(&time, 3, 4);

    let mut last = generator.next_id(&9).unwrap();
    for i in 1..20_000 {
        if i % 5_000 == 0 {
            time.seconds.fetch_add(1, Ordering::SeqCst);
        }
        let id = generator.next_id(&9).unwrap();
        assert!(id > last, "{id:?} <= {last:?}");
        last = id;
    }
    assert_eq!(last.created_at().as_secs() as i64, JUNE_2025 + 3);
}

#[test]
fn rejects_invalid_sources_and_times() {
    let time = MockTime::at(JUNE_2025);
    assert_eq!(
        SourceKnownIdGenerator::<u16, _>::new(Arc::clone(&time), BACKOFF, 64, 0, DEFAULT_EPOCH)
            .unwrap_err(),
        Error::InvalidApplicationId(64)
    );

    let generator = generator(&time, 0, 0);
    assert_eq!(
        generator.generate(&1, 0, 32, DEFAULT_EPOCH).unwrap_err(),
        Error::InvalidApplicationInstanceId(32)
    );

    let future_epoch = Duration::from_secs(JUNE_2025 as u64 + 5);
    assert_eq!(
        generator.generate(&1, 0, 0, future_epoch).unwrap_err(),
        Error::TimestampOutOfRange { seconds: -5 }
    );

    let past_the_range = DEFAULT_EPOCH.as_secs() as i64 + i64::from(MAX_RESIDUE_SECONDS) + 1;
    time.seconds.store(past_the_range, Ordering::SeqCst);
    assert!(matches!(
        generator.next_id(&1),
        Err(Error::TimestampOutOfRange { .. })
    ));
}

#[test]
fn try_generate_reports_exhaustion() {
    let time = MockTime::at(JUNE_2025);
    let generator = generator(&time, 1, 1);
    for _ in 0..=MAX_SEQUENCE {
        assert!(matches!(
            generator.try_generate(&2).unwrap(),
            IdGenStatus::Ready { .. }
        ));
    }
    assert_eq!(
        generator.try_generate(&2).unwrap(),
        IdGenStatus::Pending { yield_for: BACKOFF }
    );
    // other entity types are unaffected
    assert!(matches!(
        generator.try_generate(&3).unwrap(),
        IdGenStatus::Ready { .. }
    ));
}

#[tokio::test]
async fn async_generation_round_trips() {
    let time = MockTime::at(JUNE_2025);
    let generator = generator(&time, 7, 8);
    let a = generator.next_id_async(&1).await.unwrap();
    let b = generator.generate_async(&1, 9, 10, DEFAULT_EPOCH).await.unwrap();
    assert!(a < b);
    assert_eq!(generator.parse(b.id()).unwrap().app_id(), 9);
    assert_eq!(b.sequence(), 1);
}

/// Full-budget run against the real clock: 8 workers share three seconds'
/// worth of sequences for a single entity type.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "issues ~6M ids against the wall clock; run with --release -- --ignored"]
async fn concurrent_workers_never_collide_on_the_real_clock() {
    use crate::{ClockConfig, HybridClock, TimestampCache};

    const WORKERS: usize = 8;
    const PER_WORKER: usize = MAX_SEQUENCE as usize * 3 / WORKERS;

    let clock = HybridClock::system(ClockConfig::default()).unwrap();
    let cache = TimestampCache::start(clock, Duration::from_millis(10)).unwrap();
    let generator = Arc::new(
        SourceKnownIdGenerator::<u16, _>::new(
            cache.clone(),
            cache.refresh_period(),
            1,
            1,
            DEFAULT_EPOCH,
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let generator = Arc::clone(&generator);
            tokio::task::spawn_blocking(move || {
                (0..PER_WORKER)
                    .map(|_| generator.next_id(&1).unwrap().id())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = Vec::with_capacity(WORKERS * PER_WORKER);
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    let unique: HashSet<i64> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len());

    let mut buckets: BTreeMap<u32, u32> = BTreeMap::new();
    for id in &all {
        let parsed = SourceKnownId::parse(*id, DEFAULT_EPOCH).unwrap();
        let min = buckets.entry(parsed.residue_seconds()).or_insert(u32::MAX);
        *min = (*min).min(parsed.sequence());
    }
    assert!((3..=5).contains(&buckets.len()), "{} buckets", buckets.len());
    assert!(buckets.values().all(|min| *min == 0));
    cache.stop();
}
