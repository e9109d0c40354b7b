//! Auth Module
//!
//! Accounts and the per-connection register/login handshake.
//!
//! ## Responsibilities
//! - Own the shared user directory and its locking
//! - Atomic check-and-insert for registration
//! - Drive each session from `AwaitingCredentials` to `Authenticated`

mod directory;
mod session;

pub use directory::{AuthOutcome, User, UserDirectory};
pub use session::{Authenticator, SessionState};
