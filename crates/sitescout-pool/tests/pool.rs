use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sitescout_pool::{anyhow, Dispatch, SequentialExecutor, WorkerPool};

#[test]
fn drains_every_item_exactly_once() {
    let seen = (0..100).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();
    let dequeued = AtomicUsize::new(0);

    let mut pool = WorkerPool::new(5);
    pool.submit_batch(0..100usize);
    assert_eq!(100, pool.queued());

    let start = Instant::now();
    let outcome = pool
        .run(|i| {
            dequeued.fetch_add(1, Ordering::SeqCst);
            seen[i].fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(outcome.is_complete());
    assert_eq!(100, outcome.results.len());
    assert_eq!(100, dequeued.load(Ordering::SeqCst));
    assert!(seen.iter().all(|c| c.load(Ordering::SeqCst) == 1));
}

#[test]
fn collects_results() {
    let mut pool = WorkerPool::new(3);
    pool.submit_batch(1..=10u64);

    let outcome = pool.run(|i| Ok(i * i)).unwrap();

    let mut results = outcome.results;
    results.sort_unstable();
    assert_eq!(vec![1, 4, 9, 16, 25, 36, 49, 64, 81, 100], results);
}

#[test]
fn failing_item_stops_only_its_worker() {
    let processed = AtomicUsize::new(0);

    let mut pool = WorkerPool::new(4);
    pool.submit_batch(0..50usize);

    let outcome = pool
        .run(|i| {
            if i == 7 {
                anyhow::bail!("bad item {i}");
            }
            std::thread::sleep(Duration::from_millis(1));
            processed.fetch_add(1, Ordering::SeqCst);
            Ok(i)
        })
        .unwrap();

    assert_eq!(1, outcome.failures.len());
    assert!(outcome.failures[0].message.contains("bad item 7"));
    assert_eq!(0, outcome.unprocessed);
    assert_eq!(49, processed.load(Ordering::SeqCst));
    assert!(!outcome.is_complete());
}

#[test]
fn panicking_item_is_reported_as_failure() {
    let mut pool = WorkerPool::new(2);
    pool.submit_batch(0..20usize);

    let outcome = pool
        .run(|i| {
            if i == 3 {
                panic!("boom");
            }
            Ok(i)
        })
        .unwrap();

    assert_eq!(1, outcome.failures.len());
    assert!(outcome.failures[0].message.contains("boom"));
    assert_eq!(19, outcome.results.len());
}

#[test]
fn sequential_fallback_leaves_rest_unprocessed_after_failure() {
    let mut pool = WorkerPool::with_executor(Arc::new(SequentialExecutor));
    pool.submit_batch(vec!["a", "b", "c", "d"]);

    let order = Mutex::new(vec![]);
    let outcome = pool
        .run(|s| {
            order.lock().unwrap().push(s);
            if s == "b" {
                anyhow::bail!("stop");
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(vec!["a", "b"], *order.lock().unwrap());
    assert_eq!(1, outcome.results.len());
    assert_eq!(2, outcome.unprocessed);
}

#[test]
fn empty_pool_returns_immediately() {
    let pool = WorkerPool::<u8>::new(8);
    let outcome = pool.run(|_| Ok(())).unwrap();
    assert!(outcome.is_complete());
    assert!(outcome.results.is_empty());
}

#[test]
fn dispatch_picks_executor() {
    assert_eq!(6, Dispatch::Threads.executor(6).workers());
    assert_eq!(1, Dispatch::Threads.executor(0).workers());
    assert_eq!(1, Dispatch::Sequential.executor(6).workers());
}
