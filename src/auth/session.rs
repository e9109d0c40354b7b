//! Session Authenticator
//!
//! Per-connection handshake state machine.
//!
//! ```text
//! AwaitingCredentials ──(Registered | LoggedIn)──▶ Authenticated
//!        ▲      │
//!        └──────┘ (UsernameExists | NoSuchUser | InvalidPassword)
//! ```

use super::{AuthOutcome, User, UserDirectory};
use crate::protocol::{Request, Response};

/// Handshake phase of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingCredentials,
    Authenticated(User),
}

/// Drives one connection through register/login
pub struct Authenticator {
    state: SessionState,
}

impl Authenticator {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingCredentials,
        }
    }

    /// Handle a credential request and produce the reply
    ///
    /// Non-credential requests are answered with an error and leave the
    /// state untouched. Once authenticated, further credentials are refused.
    pub fn handle(&mut self, directory: &UserDirectory, request: &Request) -> Response {
        if let SessionState::Authenticated(user) = &self.state {
            tracing::debug!("User {} sent credentials after authenticating", user.username);
            return Response::error("already authenticated");
        }

        let (username, password, outcome) = match request {
            Request::Register { username, password } => {
                (username, password, directory.register(username, password))
            }
            Request::Login { username, password } => {
                (username, password, directory.login(username, password))
            }
            _ => return Response::error("authentication required"),
        };

        tracing::info!("Auth attempt for {:?}: {:?}", username, outcome);

        if outcome.is_success() {
            self.state = SessionState::Authenticated(User::new(username.as_str(), password.as_str()));
        }

        auth_response(outcome)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The authenticated user, if the handshake has completed
    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            SessionState::AwaitingCredentials => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}

fn auth_response(outcome: AuthOutcome) -> Response {
    Response::Auth {
        success: outcome.is_success(),
        message: outcome.message().to_string(),
    }
}
