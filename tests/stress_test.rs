//! Stress tests for the dispatcher

use kiln::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

enum Load {
    Spin(u64),
    Panic,
    Reject,
}

impl Job for Load {
    fn kind(&self) -> &'static str {
        match self {
            Load::Spin(_) => "spin",
            Load::Panic => "panic",
            Load::Reject => "reject",
        }
    }
}

struct Spinner;

impl Capability for Spinner {
    type Job = Load;
    type Output = u64;

    fn run(&mut self, job: Load) -> std::result::Result<u64, String> {
        match job {
            Load::Spin(n) => Ok((0..n).fold(0u64, |acc, x| acc.wrapping_add(x * x))),
            Load::Panic => panic!("intentional panic"),
            Load::Reject => Err("rejected".to_string()),
        }
    }
}

fn expected(n: u64) -> u64 {
    (0..n).fold(0u64, |acc, x| acc.wrapping_add(x * x))
}

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_tasks() {
    let pool = Pool::new(|_| Ok(Spinner)).unwrap();

    let handles: Vec<_> = (0..50_000u64).map(|i| pool.submit(Load::Spin(i % 64))).collect();
    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.wait().unwrap(), expected(i as u64 % 64));
    }

    let stats = pool.stats();
    assert_eq!(stats.idle_count, stats.total_capacity);

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_repeated_init_shutdown() {
    for i in 0..50 {
        let config = Config::builder().num_units(4).build().unwrap();
        let pool = Pool::with_config(config, |_| Ok(Spinner)).unwrap();

        let out = pool
            .submit_batch((0..16).map(Load::Spin))
            .wait()
            .unwrap();
        assert_eq!(out.len(), 16, "iteration {}", i);

        pool.shutdown();
    }
}

#[test]
#[ignore]
fn stress_test_panic_recovery() {
    let config = Config::builder().num_units(4).build().unwrap();
    let pool = Pool::with_config(config, |_| Ok(Spinner)).unwrap();

    // Mix of panicking, failing and healthy tasks
    let handles: Vec<_> = (0..2_000u64)
        .map(|i| {
            let job = match i % 50 {
                0 => Load::Panic,
                1 => Load::Reject,
                _ => Load::Spin(1_000),
            };
            pool.submit(job)
        })
        .collect();

    let mut ok = 0;
    for h in handles {
        match h.wait() {
            Ok(_) => ok += 1,
            Err(Error::TaskFailed(_)) | Err(Error::UnitFault { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert!(ok > 0);

    // Capacity is back to full and the pool still works.
    assert_eq!(pool.stats().total_capacity, 4);
    assert_eq!(pool.submit(Load::Spin(10)).wait().unwrap(), expected(10));
    assert_eq!(pool.panic_count(), 40);

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_many_submitters() {
    let pool = Pool::new(|_| Ok(Spinner)).unwrap();
    let totals = Arc::new(Mutex::new(0u64));

    thread::scope(|s| {
        for _ in 0..16 {
            let pool = &pool;
            let totals = totals.clone();
            s.spawn(move || {
                let batch = pool.submit_batch((0..500).map(|_| Load::Spin(100)));
                let sum: u64 = batch.wait().unwrap().iter().sum();
                *totals.lock() += sum;
            });
        }
    });

    assert_eq!(*totals.lock(), expected(100) * 500 * 16);

    pool.shutdown();
}
