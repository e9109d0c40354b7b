//! User Directory Tests
//!
//! Tests verify:
//! - Registration and login outcomes and their reply messages
//! - Username uniqueness under concurrent registration
//! - Rebuilding from a snapshot

use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use gatekv::auth::{AuthOutcome, User, UserDirectory};

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_new_directory_is_empty() {
    let directory = UserDirectory::new();
    assert!(directory.is_empty());
    assert_eq!(directory.get("alice"), None);
}

#[test]
fn test_register_new_user() {
    let directory = UserDirectory::new();

    let outcome = directory.register("alice", "secret");

    assert_eq!(outcome, AuthOutcome::Registered);
    assert!(outcome.is_success());
    assert_eq!(outcome.message(), "registered");
    assert_eq!(directory.get("alice"), Some(User::new("alice", "secret")));
    assert_eq!(directory.len(), 1);
}

#[test]
fn test_register_existing_user_refused() {
    let directory = UserDirectory::new();
    directory.register("alice", "secret");

    let outcome = directory.register("alice", "other");

    assert_eq!(outcome, AuthOutcome::UsernameExists);
    assert!(!outcome.is_success());
    assert_eq!(outcome.message(), "username exists");

    // The original password is untouched
    assert_eq!(directory.login("alice", "secret"), AuthOutcome::LoggedIn);
    assert_eq!(directory.len(), 1);
}

// =============================================================================
// Login Tests
// =============================================================================

#[test]
fn test_login_outcomes() {
    let directory = UserDirectory::new();
    directory.register("bob", "pw");

    assert_eq!(directory.login("bob", "pw"), AuthOutcome::LoggedIn);
    assert_eq!(directory.login("bob", "wrong"), AuthOutcome::InvalidPassword);
    assert_eq!(directory.login("carol", "pw"), AuthOutcome::NoSuchUser);
}

#[test]
fn test_refusal_messages() {
    assert_eq!(AuthOutcome::LoggedIn.message(), "logged in");
    assert_eq!(AuthOutcome::NoSuchUser.message(), "no such user");
    assert_eq!(AuthOutcome::InvalidPassword.message(), "invalid password");
}

#[test]
fn test_passwords_are_case_sensitive() {
    let directory = UserDirectory::new();
    directory.register("bob", "Password");

    assert_eq!(directory.login("bob", "password"), AuthOutcome::InvalidPassword);
}

#[test]
fn test_user_debug_redacts_password() {
    let user = User::new("alice", "hunter2");
    let rendered = format!("{:?}", user);

    assert!(rendered.contains("alice"));
    assert!(!rendered.contains("hunter2"));
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_from_users_and_snapshot() {
    let mut users = HashMap::new();
    users.insert("alice".to_string(), User::new("alice", "a"));
    users.insert("bob".to_string(), User::new("bob", "b"));

    let directory = UserDirectory::from_users(users.clone());

    assert_eq!(directory.login("bob", "b"), AuthOutcome::LoggedIn);
    assert_eq!(directory.snapshot(), users);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_registration_single_winner() {
    let directory = Arc::new(UserDirectory::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let directory = Arc::clone(&directory);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                directory.register("shared", &format!("pw{}", i))
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = outcomes
        .iter()
        .filter(|o| **o == AuthOutcome::Registered)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(directory.len(), 1);
}

#[test]
fn test_concurrent_distinct_registrations() {
    let directory = Arc::new(UserDirectory::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let directory = Arc::clone(&directory);
            thread::spawn(move || directory.register(&format!("user{}", i), "pw"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), AuthOutcome::Registered);
    }
    assert_eq!(directory.len(), 8);
}
