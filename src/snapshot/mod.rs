//! Snapshot Module
//!
//! Persists the user directory and the store between runs.
//!
//! ## Responsibilities
//! - Load both maps at startup (missing or corrupt files mean empty maps)
//! - Write both maps at shutdown and on optional periodic checkpoints
//! - Never expose a half-written file to the next load
//!
//! ## File Format
//! ```text
//! ┌──────────┬─────────────┬─────────┬─────────┬──────────────────┐
//! │Magic (4) │ Version (2) │ CRC (4) │ Len (4) │ bincode payload  │
//! └──────────┴─────────────┴─────────┴─────────┴──────────────────┘
//! ```
//! All integers big-endian. The CRC covers the payload only.
//!
//! Writes go to `<name>.tmp`, are fsynced, then renamed over `<name>`.

mod file;
mod manager;

pub use file::{read_snapshot, write_snapshot, HEADER_SIZE, MAGIC, VERSION};
pub use manager::{CheckpointHandle, PersistenceManager};
