//! Contention tests for the limiter cache and token buckets.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::cast_precision_loss)]

use front_proxy::limiter::{bucket::quota, Decision, ExclusionPolicy, RateLimitFilter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE: f64 = 20.0;
const BURST: u32 = 5;

fn filter() -> Arc<RateLimitFilter> {
    let quota = quota(RATE, NonZeroU32::new(BURST).unwrap()).unwrap();
    Arc::new(RateLimitFilter::new(quota, ExclusionPolicy::default()))
}

/// Many callers hammering one user never get more than the bucket allows.
#[test]
fn test_no_over_admission_under_contention() {
    let filter = filter();
    let admitted = AtomicUsize::new(0);
    let window = Duration::from_millis(300);

    let start = Instant::now();
    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                while start.elapsed() < window {
                    if filter.check("alice") == Decision::Allowed {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });
    let elapsed = start.elapsed().as_secs_f64();

    let admitted = admitted.load(Ordering::Relaxed);
    let ceiling = f64::from(BURST) + RATE * elapsed;
    assert!(admitted >= BURST as usize, "burst was not honoured: {admitted}");
    assert!(
        admitted as f64 <= ceiling,
        "admitted {admitted} > ceiling {ceiling:.2} over {elapsed:.3}s"
    );
    assert_eq!(filter.cache().len(), 1);
}

/// Concurrent first requests from one user share a single limiter.
#[test]
fn test_concurrent_first_lookup_creates_one_entry() {
    let filter = filter();
    let admitted = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..32 {
            scope.spawn(|| {
                if filter.check("bob").is_permitted() {
                    admitted.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(filter.cache().len(), 1);
    // 32 requests land well within a second; at most the burst plus what
    // refilled while threads were starting can pass.
    assert!(admitted.load(Ordering::Relaxed) < 32);
}

/// Sweeps running alongside lookups never lose an active user's entry.
#[test]
fn test_sweep_during_lookups() {
    let filter = filter();
    let stop = std::sync::atomic::AtomicBool::new(false);

    std::thread::scope(|scope| {
        for user in ["alice", "bob", "carol", "dave"] {
            let filter = &filter;
            let stop = &stop;
            scope.spawn(move || loop {
                let _ = filter.check(user);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
            });
        }

        let sweeper = scope.spawn(|| {
            let mut evicted = 0;
            for _ in 0..200 {
                evicted += filter.cache().sweep(Duration::from_secs(60));
            }
            evicted
        });

        let evicted = sweeper.join().unwrap();
        stop.store(true, Ordering::Relaxed);
        assert_eq!(evicted, 0);
    });

    assert_eq!(filter.cache().len(), 4);
}
