//! Persistence Manager
//!
//! Loads and saves the two snapshot artifacts, and runs periodic checkpoints.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::{read_snapshot, write_snapshot};
use crate::auth::{User, UserDirectory};
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::store::Store;

/// Owns the snapshot locations
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    users_path: PathBuf,
    store_path: PathBuf,

    /// Held for a whole save; concurrent saves would share the temp files
    save_lock: Arc<Mutex<()>>,
}

impl PersistenceManager {
    pub fn new(users_path: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            users_path: users_path.into(),
            store_path: store_path.into(),
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.users_snapshot.clone(), config.store_snapshot.clone())
    }

    /// Load both maps
    ///
    /// Never fails: a missing artifact starts empty, a corrupt or
    /// unreadable one is logged and also starts empty.
    pub fn load(&self) -> (UserDirectory, Store) {
        let users: HashMap<String, User> = load_or_empty(&self.users_path, "user directory");
        let entries: HashMap<String, Vec<u8>> = load_or_empty(&self.store_path, "store");

        tracing::info!(
            "Loaded {} users and {} entries from snapshot",
            users.len(),
            entries.len()
        );

        (UserDirectory::from_users(users), Store::from_entries(entries))
    }

    /// Write both maps
    ///
    /// Each artifact is replaced atomically. Both writes are attempted even
    /// if the first fails; the first error is returned. Saves from the
    /// checkpoint thread and from callers run one at a time.
    pub fn save(&self, users: &UserDirectory, store: &Store) -> Result<()> {
        let _guard = self.save_lock.lock();

        let users_snapshot = users.snapshot();
        let entries_snapshot = store.snapshot();

        let users_result = write_snapshot(&self.users_path, &users_snapshot);
        if let Err(e) = &users_result {
            tracing::error!("Failed to save user directory to {}: {}", self.users_path.display(), e);
        }

        let store_result = write_snapshot(&self.store_path, &entries_snapshot);
        if let Err(e) = &store_result {
            tracing::error!("Failed to save store to {}: {}", self.store_path.display(), e);
        }

        users_result?;
        store_result?;

        tracing::info!(
            "Saved snapshot: {} users, {} entries",
            users_snapshot.len(),
            entries_snapshot.len()
        );
        Ok(())
    }

    /// Start a background thread that saves every `interval`
    pub fn start_checkpoints(
        self: Arc<Self>,
        users: Arc<UserDirectory>,
        store: Arc<Store>,
        interval: Duration,
    ) -> Result<CheckpointHandle> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let thread = thread::Builder::new()
            .name("gatekv-checkpoint".to_string())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(ticker) -> _ => {
                        tracing::debug!("Periodic checkpoint");
                        if let Err(e) = self.save(&users, &store) {
                            tracing::warn!("Checkpoint failed: {}", e);
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })
            .map_err(GateError::Io)?;

        Ok(CheckpointHandle {
            stop_tx,
            thread: Some(thread),
        })
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }
}

/// Stops the checkpoint thread on `stop()` or drop
pub struct CheckpointHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CheckpointHandle {
    /// Stop the thread and wait for an in-progress checkpoint to finish
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Checkpoint thread panicked");
            }
        }
    }
}

impl Drop for CheckpointHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

fn load_or_empty<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    match read_snapshot(path) {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::info!("No {} snapshot at {}, starting empty", what, path.display());
            T::default()
        }
        Err(e) => {
            tracing::warn!(
                "Ignoring unreadable {} snapshot at {}: {}",
                what,
                path.display(),
                e
            );
            T::default()
        }
    }
}
