//! User Directory
//!
//! Username → account mapping shared by every session.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A registered account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a register or login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Account created; the session is now authenticated
    Registered,

    /// Credentials matched; the session is now authenticated
    LoggedIn,

    /// Register refused: the username is taken
    UsernameExists,

    /// Login refused: unknown username
    NoSuchUser,

    /// Login refused: wrong password
    InvalidPassword,
}

impl AuthOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AuthOutcome::Registered | AuthOutcome::LoggedIn)
    }

    /// Message sent back to the client
    pub fn message(self) -> &'static str {
        match self {
            AuthOutcome::Registered => "registered",
            AuthOutcome::LoggedIn => "logged in",
            AuthOutcome::UsernameExists => "username exists",
            AuthOutcome::NoSuchUser => "no such user",
            AuthOutcome::InvalidPassword => "invalid password",
        }
    }
}

/// Shared user directory
///
/// Users are created once and never modified or removed.
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::from_users(HashMap::new())
    }

    /// Rebuild from a snapshot
    pub fn from_users(users: HashMap<String, User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Create an account if the username is free
    ///
    /// Check and insert happen under one write lock, so concurrent
    /// registrations of the same name cannot both succeed.
    pub fn register(&self, username: &str, password: &str) -> AuthOutcome {
        let mut users = self.users.write();
        match users.entry(username.to_string()) {
            Entry::Occupied(_) => AuthOutcome::UsernameExists,
            Entry::Vacant(slot) => {
                slot.insert(User::new(username, password));
                AuthOutcome::Registered
            }
        }
    }

    /// Check credentials against an existing account
    pub fn login(&self, username: &str, password: &str) -> AuthOutcome {
        match self.users.read().get(username) {
            None => AuthOutcome::NoSuchUser,
            Some(user) if user.password == password => AuthOutcome::LoggedIn,
            Some(_) => AuthOutcome::InvalidPassword,
        }
    }

    /// Look up an account
    pub fn get(&self, username: &str) -> Option<User> {
        self.users.read().get(username).cloned()
    }

    /// Clone the current contents (for snapshots)
    pub fn snapshot(&self) -> HashMap<String, User> {
        self.users.read().clone()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}
