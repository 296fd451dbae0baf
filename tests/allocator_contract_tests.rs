//! Facade contract: accounting, validation, resizing and timeouts.

use poolspace_alloc::{Error, FairQueueAllocator, Shortage, Wait};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn assert_consistent<K>(alloc: &FairQueueAllocator<K>)
where
    K: Eq + std::hash::Hash + Clone + std::fmt::Debug + Send + 'static,
{
    let stats = alloc.stats();
    let sum: u64 = alloc.allocations().values().sum();
    assert_eq!(sum, stats.used_bytes);
    assert!(stats.used_bytes <= stats.total_bytes);
    assert_eq!(stats.free_bytes, stats.total_bytes - stats.used_bytes);
    assert!(alloc.allocations().values().all(|&b| b > 0));
}

#[test]
fn test_exhaustion_with_immediate_requests() {
    let alloc = FairQueueAllocator::new(1000);

    alloc.allocate(&"e1", 400, Wait::Immediate).expect("e1");
    alloc.allocate(&"e2", 400, Wait::Immediate).expect("e2");
    assert_eq!(alloc.used_space(), 800);
    assert_eq!(alloc.free_space(), 200);

    let started = Instant::now();
    let err = alloc
        .allocate(&"e3", 400, Wait::Immediate)
        .expect_err("no room for e3");
    assert!(matches!(
        err,
        Error::ResourceUnavailable {
            reason: Shortage::Immediate,
            ..
        }
    ));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(alloc.used_space(), 800);
    assert_consistent(&alloc);
}

#[test]
fn test_allocations_on_one_entry_accumulate() {
    let alloc = FairQueueAllocator::new(1000);
    alloc.allocate(&"stream", 100, Wait::Immediate).unwrap();
    alloc.allocate(&"stream", 250, Wait::Immediate).unwrap();
    assert_eq!(alloc.used_space_of(&"stream").unwrap(), 350);
    assert_eq!(alloc.allocations().len(), 1);
}

#[test]
fn test_double_free_is_unknown_entry() {
    let alloc = FairQueueAllocator::new(100);
    assert!(matches!(alloc.free(&"never"), Err(Error::UnknownEntry(_))));

    alloc.allocate(&"e", 40, Wait::Immediate).unwrap();
    alloc.free(&"e").unwrap();
    let err = alloc.free(&"e").unwrap_err();
    assert!(matches!(err, Error::UnknownEntry(ref s) if s.contains('e')));
    assert!(matches!(alloc.used_space_of(&"e"), Err(Error::UnknownEntry(_))));
    assert!(matches!(
        alloc.reallocate(&"e", 10),
        Err(Error::UnknownEntry(_))
    ));
}

#[test]
fn test_reallocate_growth_never_blocks() {
    let alloc = FairQueueAllocator::new(100);
    alloc.allocate(&"a", 60, Wait::Immediate).unwrap();
    alloc.allocate(&"b", 30, Wait::Immediate).unwrap();

    let started = Instant::now();
    let err = alloc.reallocate(&"a", 80).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        err,
        Error::ResourceUnavailable {
            reason: Shortage::Growth,
            requested: 20,
            free: 10
        }
    ));
    assert_eq!(alloc.used_space_of(&"a").unwrap(), 60);

    alloc.reallocate(&"a", 70).unwrap();
    assert_eq!(alloc.free_space(), 0);
    alloc.reallocate(&"a", 5).unwrap();
    assert_eq!(alloc.free_space(), 65);
    assert_consistent(&alloc);
}

#[test]
fn test_resize_below_used_fails_and_keeps_total() {
    let alloc = FairQueueAllocator::new(1000);
    alloc.allocate(&"a", 700, Wait::Immediate).unwrap();

    let err = alloc.set_total_space(699).unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceUnavailable {
            reason: Shortage::BelowUsed,
            ..
        }
    ));
    assert_eq!(alloc.total_space(), 1000);

    alloc.set_total_space(700).unwrap();
    assert_eq!(alloc.free_space(), 0);
    alloc.set_total_space(5000).unwrap();
    assert_eq!(alloc.free_space(), 4300);
    assert_consistent(&alloc);
}

#[test]
fn test_resize_growth_unblocks_queued_requests() {
    let alloc = FairQueueAllocator::new(100);
    alloc.allocate(&"a", 100, Wait::Immediate).unwrap();

    let waiters: Vec<_> = ["w1", "w2"]
        .into_iter()
        .map(|name| {
            let a = alloc.clone();
            thread::spawn(move || a.allocate(&name, 50, Wait::For(Duration::from_secs(10))))
        })
        .collect();
    while alloc.waiting() < 2 {
        thread::sleep(Duration::from_millis(1));
    }

    alloc.set_total_space(200).unwrap();
    for w in waiters {
        w.join().expect("waiter panicked").expect("granted after growth");
    }
    assert_eq!(alloc.free_space(), 0);
    assert_consistent(&alloc);
}

#[test]
fn test_timeout_is_a_lower_bound() {
    let alloc = FairQueueAllocator::new(100);
    alloc.allocate(&"held", 100, Wait::Immediate).unwrap();

    let started = Instant::now();
    let err = alloc
        .allocate(&"late", 10, Wait::For(Duration::from_millis(2000)))
        .unwrap_err();
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(2000), "returned after {:?}", waited);
    assert!(matches!(
        err,
        Error::ResourceUnavailable {
            reason: Shortage::Timeout,
            requested: 10,
            ..
        }
    ));
    assert_eq!(alloc.waiting(), 0);
    assert!(alloc.used_space_of(&"late").is_err());
}

#[test]
fn test_wait_from_millis_drives_allocate() {
    let alloc = FairQueueAllocator::new(10);
    alloc.allocate(&"a", 10, Wait::from_millis(0)).unwrap();
    assert!(alloc
        .allocate(&"b", 1, Wait::from_millis(0))
        .unwrap_err()
        .is_unavailable());
    assert!(alloc
        .allocate(&"b", 1, Wait::from_millis(20))
        .unwrap_err()
        .is_unavailable());
}

#[test]
fn test_invariants_hold_under_concurrent_churn() {
    let alloc = Arc::new(FairQueueAllocator::new(1000));
    let mut handles = vec![];

    for t in 0..8u64 {
        let alloc = Arc::clone(&alloc);
        handles.push(thread::spawn(move || {
            // Small deterministic LCG so every run exercises the same mix.
            let mut x = t.wrapping_mul(6364136223846793005).wrapping_add(1);
            for _ in 0..200 {
                x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let bytes = 1 + (x >> 33) % 300;
                alloc.allocate(&t, bytes, Wait::Forever).expect("forever wait");
                if (x >> 20) % 3 == 0 {
                    alloc.reallocate(&t, bytes / 2).expect("shrink");
                }
                if alloc.used_space_of(&t).is_ok() {
                    alloc.free(&t).expect("free own entry");
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(alloc.used_space(), 0);
    assert_eq!(alloc.waiting(), 0);
    assert!(alloc.allocations().is_empty());
    assert!(alloc.stats().peak_used_bytes <= 1000);
}

#[test]
fn test_stats_snapshot_matches_accessors() {
    let alloc = FairQueueAllocator::new(1000);
    alloc.allocate(&"a", 300, Wait::Immediate).unwrap();
    alloc.allocate(&"b", 200, Wait::Immediate).unwrap();
    alloc.free(&"b").unwrap();

    let stats = alloc.stats();
    assert_eq!(stats.total_bytes, alloc.total_space());
    assert_eq!(stats.used_bytes, 300);
    assert_eq!(stats.free_bytes, 700);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.waiting, 0);
    assert_eq!(stats.peak_used_bytes, 500);

    let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
    assert_eq!(json["used_bytes"], 300);
}
