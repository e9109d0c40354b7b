//! Wait cancellation
//!
//! A session-scoped flag that releases a blocked getWhen when the
//! connection goes away or the server shuts down.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type PeerProbe = dyn Fn() -> bool + Send + Sync;

/// Cancellation token shared between a session and whoever may abort it
#[derive(Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,

    /// Returns true once the remote end is known to be gone.
    /// Only consulted on poll timeouts.
    peer_gone: Option<Arc<PeerProbe>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a liveness probe for the session's peer
    pub fn with_peer_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.peer_gone = Some(Arc::new(probe));
        self
    }

    /// Fire the token; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run the peer probe; a dead peer also fires the token
    pub fn peer_gone(&self) -> bool {
        match &self.peer_gone {
            Some(probe) if probe() => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .field("has_peer_probe", &self.peer_gone.is_some())
            .finish()
    }
}
