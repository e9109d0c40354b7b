//! Engine Module
//!
//! The server-side state that every session shares.
//!
//! ## Responsibilities
//! - Own the user directory, the store and the persistence manager
//! - Load snapshots on open, write them on close
//! - Run periodic checkpoints when configured
//! - Turn one storage request into exactly one response

use std::sync::Arc;

use parking_lot::Mutex;

use crate::auth::UserDirectory;
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::protocol::{response_payload_len, Request, Response, MAX_PAYLOAD_SIZE};
use crate::snapshot::{CheckpointHandle, PersistenceManager};
use crate::store::{Cancellation, MultiGet, Store, WaitPolicy};

/// Shared server state
///
/// ## Concurrency Model
///
/// - `users`: RwLock inside the directory; register is one write-locked
///   check-and-insert
/// - `store`: one mutex + condvar monitor; see the store module
/// - `checkpoints`: only touched on open/close
///
/// There is no other cross-session mutable state.
pub struct Engine {
    /// Engine configuration
    config: Config,

    users: Arc<UserDirectory>,

    store: Arc<Store>,

    persistence: Arc<PersistenceManager>,

    /// Periodic checkpoint thread, if enabled
    checkpoints: Mutex<Option<CheckpointHandle>>,
}

impl Engine {
    /// Open an engine with the given config
    ///
    /// On startup:
    /// 1. Load the user directory and store snapshots (missing/corrupt = empty)
    /// 2. Apply the getWhen wait policy
    /// 3. Start periodic checkpoints if configured
    pub fn open(config: Config) -> Result<Self> {
        let persistence = Arc::new(PersistenceManager::from_config(&config));
        let (users, store) = persistence.load();

        let store = store.with_wait_policy(WaitPolicy {
            poll_interval: config.wait_poll_interval,
            timeout: config.get_when_timeout,
        });

        let users = Arc::new(users);
        let store = Arc::new(store);

        let checkpoints = match config.checkpoint_interval {
            Some(interval) => {
                tracing::info!("Checkpointing every {:?}", interval);
                Some(Arc::clone(&persistence).start_checkpoints(
                    Arc::clone(&users),
                    Arc::clone(&store),
                    interval,
                )?)
            }
            None => None,
        };

        Ok(Self {
            config,
            users,
            store,
            persistence,
            checkpoints: Mutex::new(checkpoints),
        })
    }

    /// Execute an authenticated storage request
    ///
    /// `cancel` releases a blocked getWhen when the session goes away.
    /// Credential and exit requests are handled by the connection and are
    /// answered with an error here. A reply too large for one frame is
    /// replaced by an error.
    pub fn execute(&self, request: Request, cancel: &Cancellation) -> Response {
        let response = self.dispatch(request, cancel);

        let payload_len = response_payload_len(&response);
        if payload_len > MAX_PAYLOAD_SIZE as usize {
            tracing::warn!(
                "Refusing {:?} reply of {} bytes (max {})",
                response.status(),
                payload_len,
                MAX_PAYLOAD_SIZE
            );
            return Response::error("response too large");
        }

        response
    }

    fn dispatch(&self, request: Request, cancel: &Cancellation) -> Response {
        match request {
            Request::Put { key, value } => {
                self.store.put(key, value);
                Response::ack("stored")
            }
            Request::MultiPut { pairs } => {
                let count = self.store.multi_put(pairs);
                Response::ack(format!("stored {} entries", count))
            }
            Request::Get { key } => match self.store.get(&key) {
                Some(value) => Response::Value(value),
                None => Response::NotFound,
            },
            Request::MultiGet { keys } => match self.store.multi_get(&keys) {
                MultiGet::Found(pairs) => Response::Values(pairs),
                MultiGet::NoData => Response::NotFound,
            },
            Request::GetWhen { key, cond_key, cond_value } => {
                match self.store.get_when(&key, &cond_key, &cond_value, cancel) {
                    Ok(Some(value)) => Response::Value(value),
                    Ok(None) => Response::NotFound,
                    Err(GateError::WaitCancelled) => Response::error("getWhen cancelled"),
                    Err(GateError::WaitTimeout) => Response::error("getWhen timed out"),
                    Err(e) => Response::error(e.to_string()),
                }
            }
            Request::Register { .. } | Request::Login { .. } => {
                Response::error("already authenticated")
            }
            Request::Exit => Response::error("exit is handled by the connection"),
        }
    }

    /// Write a snapshot of the current state now
    pub fn snapshot(&self) -> Result<()> {
        self.persistence.save(&self.users, &self.store)
    }

    /// Stop checkpoints and write the final snapshot
    pub fn close(&self) -> Result<()> {
        if let Some(checkpoints) = self.checkpoints.lock().take() {
            checkpoints.stop();
        }
        self.snapshot()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
