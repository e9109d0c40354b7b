//! Store implementation
//!
//! HashMap-based store with a mutex and a broadcast condition variable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{Cancellation, MultiGet};
use crate::error::{GateError, Result};

/// Timing knobs for getWhen
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Longest a waiter sleeps before re-checking cancellation and its peer
    pub poll_interval: Duration,

    /// Give up after this long (None = wait until satisfied or cancelled)
    pub timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            timeout: None,
        }
    }
}

/// Shared key-value map
///
/// ## Concurrency:
/// - `data`: the only lock; every operation holds it for a bounded section
/// - `changed`: broadcast on every successful put, and on shutdown
/// - getWhen re-evaluates its predicate under `data` after every wake
pub struct Store {
    data: Mutex<HashMap<String, Vec<u8>>>,

    changed: Condvar,

    policy: WaitPolicy,

    /// Number of sessions currently blocked in getWhen
    waiting: AtomicUsize,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::from_entries(HashMap::new())
    }

    /// Create a store pre-populated from a snapshot
    pub fn from_entries(entries: HashMap<String, Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(entries),
            changed: Condvar::new(),
            policy: WaitPolicy::default(),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Replace the getWhen timing policy
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Insert or overwrite a value, then wake every waiter
    pub fn put(&self, key: String, value: Vec<u8>) {
        let mut data = self.data.lock();
        data.insert(key, value);
        drop(data);

        self.changed.notify_all();
    }

    /// Apply each pair as an individual put
    ///
    /// Other sessions may observe some pairs before others.
    pub fn multi_put(&self, pairs: Vec<(String, Vec<u8>)>) -> usize {
        let count = pairs.len();
        for (key, value) in pairs {
            self.put(key, value);
        }
        count
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().get(key).cloned()
    }

    /// Get several keys, omitting the missing ones
    pub fn multi_get(&self, keys: &[String]) -> MultiGet {
        let mut found = Vec::with_capacity(keys.len());

        for key in keys {
            match self.get(key) {
                Some(value) => found.push((key.clone(), value)),
                None => tracing::debug!("multiGet: no value for key {:?}", key),
            }
        }

        if found.is_empty() {
            MultiGet::NoData
        } else {
            MultiGet::Found(found)
        }
    }

    /// Block until `cond_key` holds exactly `cond_value`, then read `key`
    ///
    /// The predicate and the read happen under the same lock acquisition.
    /// Returns:
    /// - `Ok(Some(value))` / `Ok(None)` once the predicate holds
    /// - `Err(WaitCancelled)` if `cancel` fires or its peer probe reports the peer gone
    /// - `Err(WaitTimeout)` if the policy timeout elapses first
    pub fn get_when(
        &self,
        key: &str,
        cond_key: &str,
        cond_value: &[u8],
        cancel: &Cancellation,
    ) -> Result<Option<Vec<u8>>> {
        let deadline = self.policy.timeout.map(|t| Instant::now() + t);
        let mut data = self.data.lock();

        if Self::holds(&data, cond_key, cond_value) {
            return Ok(data.get(key).cloned());
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let outcome = self.wait_for_condition(&mut data, key, cond_key, cond_value, cancel, deadline);
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        outcome
    }

    fn wait_for_condition(
        &self,
        data: &mut MutexGuard<'_, HashMap<String, Vec<u8>>>,
        key: &str,
        cond_key: &str,
        cond_value: &[u8],
        cancel: &Cancellation,
        deadline: Option<Instant>,
    ) -> Result<Option<Vec<u8>>> {
        let mut last_probe = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(GateError::WaitCancelled);
            }

            let mut sleep = self.policy.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(GateError::WaitTimeout);
                }
                sleep = sleep.min(deadline - now);
            }

            self.changed.wait_for(data, sleep);

            if Self::holds(data, cond_key, cond_value) {
                return Ok(data.get(key).cloned());
            }

            // Once per poll interval, whether woken by a put or a timeout
            if last_probe.elapsed() >= self.policy.poll_interval {
                last_probe = Instant::now();

                if MutexGuard::unlocked(data, || cancel.peer_gone()) {
                    return Err(GateError::WaitCancelled);
                }

                // A put may have landed while the lock was released
                if Self::holds(data, cond_key, cond_value) {
                    return Ok(data.get(key).cloned());
                }
            }
        }
    }

    fn holds(data: &HashMap<String, Vec<u8>>, cond_key: &str, cond_value: &[u8]) -> bool {
        data.get(cond_key).map(Vec::as_slice) == Some(cond_value)
    }

    /// Wake every waiter so it re-checks its predicate and cancellation
    pub fn wake_all(&self) {
        // Taking the lock orders this wake after any in-progress predicate check
        drop(self.data.lock());
        self.changed.notify_all();
    }

    /// Clone the current contents (for snapshots)
    pub fn snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.data.lock().clone()
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sessions currently blocked in getWhen
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
