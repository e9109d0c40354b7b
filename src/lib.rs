//! # GateKV
//!
//! An authenticated, in-memory key-value server with:
//! - Register/login handshake per TCP session
//! - Length-prefixed binary protocol (values are opaque bytes)
//! - Blocking conditional reads (getWhen) woken by every write
//! - Bounded admission of concurrently served sessions
//! - Graceful drain and crash-safe snapshots on shutdown
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Accept Loop (non-blocking)               │
//! │          registers every socket, never waits on admission    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one thread per connection
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Permit Pool (FIFO, fixed capacity)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Connection: Authenticator → Request Loop            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Users    │          │    Store    │
//!   │  (RwLock)   │          │(Mutex+Cvar) │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬────────────┘
//!                       ▼
//!               ┌─────────────┐
//!               │  Snapshots  │
//!               │(tmp+rename) │
//!               └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod auth;
pub mod store;
pub mod snapshot;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GateError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of GateKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
