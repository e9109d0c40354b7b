//! Session Authenticator Tests
//!
//! Tests verify the handshake state machine: which requests move a session
//! to authenticated, which leave it waiting, and what gets refused.

use gatekv::auth::{Authenticator, SessionState, User, UserDirectory};
use gatekv::protocol::{Request, Response};

fn register(username: &str, password: &str) -> Request {
    Request::Register {
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn login(username: &str, password: &str) -> Request {
    Request::Login {
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn auth(success: bool, message: &str) -> Response {
    Response::Auth {
        success,
        message: message.to_string(),
    }
}

// =============================================================================
// Initial State
// =============================================================================

#[test]
fn test_starts_awaiting_credentials() {
    let session = Authenticator::new();

    assert_eq!(session.state(), &SessionState::AwaitingCredentials);
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
}

#[test]
fn test_storage_request_before_login_refused() {
    let directory = UserDirectory::new();
    let mut session = Authenticator::new();

    let reply = session.handle(&directory, &Request::Get { key: "k".to_string() });

    assert_eq!(reply, Response::error("authentication required"));
    assert!(!session.is_authenticated());
}

// =============================================================================
// Successful Transitions
// =============================================================================

#[test]
fn test_register_authenticates() {
    let directory = UserDirectory::new();
    let mut session = Authenticator::new();

    let reply = session.handle(&directory, &register("alice", "pw"));

    assert_eq!(reply, auth(true, "registered"));
    assert_eq!(session.user(), Some(&User::new("alice", "pw")));
}

#[test]
fn test_login_authenticates() {
    let directory = UserDirectory::new();
    directory.register("bob", "pw");
    let mut session = Authenticator::new();

    let reply = session.handle(&directory, &login("bob", "pw"));

    assert_eq!(reply, auth(true, "logged in"));
    assert!(session.is_authenticated());
}

// =============================================================================
// Refusals Keep The Session Waiting
// =============================================================================

#[test]
fn test_failures_then_success() {
    let directory = UserDirectory::new();
    directory.register("bob", "pw");
    let mut session = Authenticator::new();

    assert_eq!(
        session.handle(&directory, &login("nobody", "pw")),
        auth(false, "no such user")
    );
    assert_eq!(
        session.handle(&directory, &login("bob", "nope")),
        auth(false, "invalid password")
    );
    assert_eq!(
        session.handle(&directory, &register("bob", "x")),
        auth(false, "username exists")
    );
    assert_eq!(session.state(), &SessionState::AwaitingCredentials);

    assert_eq!(session.handle(&directory, &login("bob", "pw")), auth(true, "logged in"));
    assert!(session.is_authenticated());
}

#[test]
fn test_credentials_after_login_refused() {
    let directory = UserDirectory::new();
    let mut session = Authenticator::new();
    session.handle(&directory, &register("alice", "pw"));

    let reply = session.handle(&directory, &register("mallory", "pw"));

    assert_eq!(reply, Response::error("already authenticated"));
    assert_eq!(session.user(), Some(&User::new("alice", "pw")));
    // The second registration never reached the directory
    assert!(directory.get("mallory").is_none());
}

#[test]
fn test_sessions_are_independent() {
    let directory = UserDirectory::new();
    let mut first = Authenticator::new();
    let mut second = Authenticator::new();

    first.handle(&directory, &register("alice", "pw"));

    assert!(first.is_authenticated());
    assert!(!second.is_authenticated());
    assert_eq!(second.handle(&directory, &login("alice", "pw")), auth(true, "logged in"));
}
