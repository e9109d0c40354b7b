//! Store Module
//!
//! The shared key-value map every session reads and writes.
//!
//! ## Responsibilities
//! - Atomic put/get per key, last writer wins
//! - Per-element multiPut/multiGet (not transactional across the key list)
//! - Blocking conditional reads (getWhen) woken by every mutation
//!
//! ## Concurrency
//! A single monitor: one mutex guards the map and one condition variable is
//! tied to it. Every put broadcasts; each waiter re-checks its own predicate,
//! so spurious and unrelated wakes are harmless.

mod cancel;
mod table;

pub use cancel::Cancellation;
pub use table::{Store, WaitPolicy};

/// Result of a multiGet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiGet {
    /// The keys that had values, in request order
    Found(Vec<(String, Vec<u8>)>),

    /// None of the requested keys had a value
    NoData,
}
