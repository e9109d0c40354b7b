//! Tests for Engine
//!
//! These tests verify:
//! - Storage request execution and the responses it produces
//! - getWhen through the engine, including cancellation and timeout
//! - Snapshot on close and reload on open
//! - Periodic checkpoints
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use gatekv::config::Config;
use gatekv::engine::Engine;
use gatekv::protocol::{Request, Response, MAX_PAYLOAD_SIZE};
use gatekv::store::Cancellation;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .snapshot_dir(temp_dir.path())
        .wait_poll_interval(Duration::from_millis(20))
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn put(key: &str, value: &[u8]) -> Request {
    Request::Put {
        key: key.to_string(),
        value: value.to_vec(),
    }
}

fn get(key: &str) -> Request {
    Request::Get {
        key: key.to_string(),
    }
}

fn get_when(key: &str, cond_key: &str, cond_value: &[u8]) -> Request {
    Request::GetWhen {
        key: key.to_string(),
        cond_key: cond_key.to_string(),
        cond_value: cond_value.to_vec(),
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_empty() {
    let (_temp_dir, engine) = setup_temp_engine();

    assert!(engine.store().is_empty());
    assert!(engine.users().is_empty());
}

#[test]
fn test_execute_put_get() {
    let (_temp_dir, engine) = setup_temp_engine();
    let cancel = Cancellation::new();

    assert_eq!(engine.execute(put("k", b"v"), &cancel), Response::ack("stored"));
    assert_eq!(engine.execute(get("k"), &cancel), Response::Value(b"v".to_vec()));
    assert_eq!(engine.execute(get("missing"), &cancel), Response::NotFound);
}

#[test]
fn test_execute_empty_value_is_found() {
    let (_temp_dir, engine) = setup_temp_engine();
    let cancel = Cancellation::new();

    engine.execute(put("empty", b""), &cancel);

    assert_eq!(engine.execute(get("empty"), &cancel), Response::Value(vec![]));
}

#[test]
fn test_execute_multi_put_multi_get() {
    let (_temp_dir, engine) = setup_temp_engine();
    let cancel = Cancellation::new();

    let reply = engine.execute(
        Request::MultiPut {
            pairs: vec![
                ("a".to_string(), b"1".to_vec()),
                ("b".to_string(), b"2".to_vec()),
            ],
        },
        &cancel,
    );
    assert_eq!(reply, Response::ack("stored 2 entries"));

    let reply = engine.execute(
        Request::MultiGet {
            keys: vec!["a".to_string(), "x".to_string(), "b".to_string()],
        },
        &cancel,
    );
    assert_eq!(
        reply,
        Response::Values(vec![
            ("a".to_string(), b"1".to_vec()),
            ("b".to_string(), b"2".to_vec()),
        ])
    );

    let reply = engine.execute(
        Request::MultiGet {
            keys: vec!["x".to_string(), "y".to_string()],
        },
        &cancel,
    );
    assert_eq!(reply, Response::NotFound);
}

#[test]
fn test_execute_credentials_refused() {
    let (_temp_dir, engine) = setup_temp_engine();

    let reply = engine.execute(
        Request::Login {
            username: "alice".to_string(),
            password: "pw".to_string(),
        },
        &Cancellation::new(),
    );

    assert_eq!(reply, Response::error("already authenticated"));
}

#[test]
fn test_execute_oversize_multi_get_refused() {
    let (_temp_dir, engine) = setup_temp_engine();
    let cancel = Cancellation::new();
    let half = (MAX_PAYLOAD_SIZE as usize / 2) + 1024;

    // Each value alone is storable and readable
    engine.execute(put("a", &vec![0u8; half]), &cancel);
    engine.execute(put("b", &vec![1u8; half]), &cancel);
    assert!(matches!(engine.execute(get("a"), &cancel), Response::Value(_)));

    let reply = engine.execute(
        Request::MultiGet {
            keys: vec!["a".to_string(), "b".to_string()],
        },
        &cancel,
    );
    assert_eq!(reply, Response::error("response too large"));

    let reply = engine.execute(
        Request::MultiGet {
            keys: vec!["a".to_string()],
        },
        &cancel,
    );
    assert!(matches!(reply, Response::Values(ref pairs) if pairs.len() == 1));
}

// =============================================================================
// getWhen Tests
// =============================================================================

#[test]
fn test_execute_get_when_wakes() {
    let (_temp_dir, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    engine.execute(put("result", b"42"), &Cancellation::new());

    let waiter = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.execute(get_when("result", "status", b"done"), &Cancellation::new()))
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.store().waiting() == 0 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(5));
    }

    engine.execute(put("status", b"done"), &Cancellation::new());

    assert_eq!(waiter.join().unwrap(), Response::Value(b"42".to_vec()));
}

#[test]
fn test_execute_get_when_missing_key() {
    let (_temp_dir, engine) = setup_temp_engine();
    let cancel = Cancellation::new();
    engine.execute(put("status", b"done"), &cancel);

    let reply = engine.execute(get_when("result", "status", b"done"), &cancel);

    assert_eq!(reply, Response::NotFound);
}

#[test]
fn test_execute_get_when_cancelled() {
    let (_temp_dir, engine) = setup_temp_engine();
    let cancel = Cancellation::new();
    cancel.cancel();

    let reply = engine.execute(get_when("result", "status", b"done"), &cancel);

    assert_eq!(reply, Response::error("getWhen cancelled"));
}

#[test]
fn test_execute_get_when_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .snapshot_dir(temp_dir.path())
        .wait_poll_interval(Duration::from_millis(20))
        .get_when_timeout(Some(Duration::from_millis(100)))
        .build();
    let engine = Engine::open(config).unwrap();

    let reply = engine.execute(get_when("result", "status", b"done"), &Cancellation::new());

    assert_eq!(reply, Response::error("getWhen timed out"));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_close_then_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(&temp_dir)).unwrap();
        engine.users().register("alice", "pw");
        engine.execute(put("k", &[0x00, 0xFF]), &Cancellation::new());
        engine.close().unwrap();
    }

    assert!(temp_dir.path().join("users.snap").exists());
    assert!(temp_dir.path().join("store.snap").exists());

    let engine = Engine::open(test_config(&temp_dir)).unwrap();
    assert!(engine.users().get("alice").is_some());
    assert_eq!(engine.store().get("k"), Some(vec![0x00, 0xFF]));
}

#[test]
fn test_open_ignores_corrupt_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("store.snap"), b"garbage").unwrap();

    let engine = Engine::open(test_config(&temp_dir)).unwrap();

    assert!(engine.store().is_empty());
}

#[test]
fn test_periodic_checkpoint_without_close() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .snapshot_dir(temp_dir.path())
        .checkpoint_interval(Some(Duration::from_millis(50)))
        .build();
    let engine = Engine::open(config).unwrap();
    engine.execute(put("k", b"v"), &Cancellation::new());

    let store_path = temp_dir.path().join("store.snap");
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let reopened = Engine::open(test_config(&temp_dir)).unwrap();
        if reopened.store().get("k").is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "checkpoint never captured the put");
        thread::sleep(Duration::from_millis(20));
    }

    assert!(store_path.exists());
    engine.close().unwrap();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_execute() {
    let (_temp_dir, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let cancel = Cancellation::new();
                for i in 0..50 {
                    let key = format!("t{}_k{}", t, i);
                    engine.execute(put(&key, key.as_bytes()), &cancel);
                    assert_eq!(
                        engine.execute(get(&key), &cancel),
                        Response::Value(key.clone().into_bytes())
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.store().len(), 200);
}
