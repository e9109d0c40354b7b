//! Admission Tests
//!
//! Tests verify:
//! - The number of held permits never exceeds capacity
//! - Dropping a permit admits the next waiter
//! - Waiters are admitted in arrival order
//! - Closing the pool releases every waiter without a permit

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use gatekv::network::PermitPool;

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

// =============================================================================
// Basic Tests
// =============================================================================

#[test]
fn test_acquire_and_release() {
    let pool = PermitPool::new(2);

    let first = pool.acquire().unwrap();
    let second = pool.acquire().unwrap();
    assert_eq!(pool.available(), 0);
    assert_eq!(pool.in_use(), 2);

    drop(first);
    assert_eq!(pool.available(), 1);

    drop(second);
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.capacity(), 2);
}

#[test]
fn test_closed_pool_refuses() {
    let pool = PermitPool::new(1);
    pool.close();

    assert!(pool.is_closed());
    assert!(pool.acquire().is_none());
}

#[test]
fn test_permit_released_on_panic() {
    let pool = Arc::new(PermitPool::new(1));

    let result = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let _permit = pool.acquire().unwrap();
            panic!("session blew up");
        })
        .join()
    };

    assert!(result.is_err());
    assert_eq!(pool.available(), 1);
}

// =============================================================================
// Blocking Tests
// =============================================================================

#[test]
fn test_waiter_admitted_after_release() {
    let pool = Arc::new(PermitPool::new(1));
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire().is_some())
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    drop(held);
    assert!(waiter.join().unwrap());
}

#[test]
fn test_close_releases_waiters() {
    let pool = Arc::new(PermitPool::new(1));
    let _held = pool.acquire().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire().is_some())
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    pool.close();

    for waiter in waiters {
        assert!(!waiter.join().unwrap());
    }
}

#[test]
fn test_fifo_admission() {
    let pool = Arc::new(PermitPool::new(1));
    let order = Arc::new(Mutex::new(Vec::new()));
    let started = Arc::new(AtomicUsize::new(0));
    let held = pool.acquire().unwrap();

    let mut waiters = Vec::new();
    for i in 0..4 {
        let pool = Arc::clone(&pool);
        let order = Arc::clone(&order);
        let started_count = Arc::clone(&started);
        waiters.push(thread::spawn(move || {
            started_count.fetch_add(1, Ordering::SeqCst);
            let _permit = pool.acquire().unwrap();
            order.lock().unwrap().push(i);
        }));

        // Let this waiter take its ticket before the next one starts
        wait_until("waiter to start", || started.load(Ordering::SeqCst) == i + 1);
        thread::sleep(Duration::from_millis(30));
    }

    drop(held);
    for waiter in waiters {
        waiter.join().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn test_bound_never_exceeded() {
    let capacity = 3;
    let pool = Arc::new(PermitPool::new(capacity));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                let _permit = pool.acquire().unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= capacity);
    assert_eq!(pool.available(), capacity);
}
