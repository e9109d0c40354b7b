//! Connection Registry
//!
//! Tracks every open client socket so shutdown can drain and close them.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Result;
use crate::store::Cancellation;

struct RegisteredConnection {
    /// Clone of the session's socket, used only to shut it down
    stream: TcpStream,
    peer_addr: String,
    cancel: Cancellation,
}

struct RegistryInner {
    next_id: u64,
    connections: HashMap<u64, RegisteredConnection>,
}

/// Set of live client connections
///
/// Entries are added on accept and removed when the session's
/// `Registration` guard drops.
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,

    /// Signalled whenever the registry becomes empty
    emptied: Condvar,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 1,
                connections: HashMap::new(),
            }),
            emptied: Condvar::new(),
        }
    }

    /// Register an accepted socket
    pub fn register(
        self: &Arc<Self>,
        stream: &TcpStream,
        peer_addr: &str,
        cancel: Cancellation,
    ) -> Result<Registration> {
        let stream = stream.try_clone()?;

        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.connections.insert(
            id,
            RegisteredConnection {
                stream,
                peer_addr: peer_addr.to_string(),
                cancel,
            },
        );

        Ok(Registration {
            registry: Arc::clone(self),
            id,
        })
    }

    fn remove(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.connections.remove(&id);
        if inner.connections.is_empty() {
            self.emptied.notify_all();
        }
    }

    /// Fire every session's cancellation token
    pub fn cancel_all(&self) {
        for connection in self.inner.lock().connections.values() {
            connection.cancel.cancel();
        }
    }

    /// Close the read half of every socket
    ///
    /// Idle sessions see end-of-stream; a session in the middle of a
    /// request can still write its response.
    pub fn shutdown_reads(&self) {
        for (id, connection) in self.inner.lock().connections.iter() {
            if let Err(e) = connection.stream.shutdown(Shutdown::Read) {
                tracing::debug!(
                    "Could not shut down reads for connection {} ({}): {}",
                    id,
                    connection.peer_addr,
                    e
                );
            }
        }
    }

    /// Forcibly close every registered socket
    ///
    /// A failure on one socket is logged and does not stop the others.
    /// Returns the number of connections that were still registered.
    pub fn close_all(&self) -> usize {
        let inner = self.inner.lock();
        for (id, connection) in inner.connections.iter() {
            connection.cancel.cancel();
            match connection.stream.shutdown(Shutdown::Both) {
                Ok(()) => tracing::debug!("Closed connection {} ({})", id, connection.peer_addr),
                Err(e) => tracing::warn!(
                    "Failed to close connection {} ({}): {}",
                    id,
                    connection.peer_addr,
                    e
                ),
            }
        }
        inner.connections.len()
    }

    /// Wait until every registration has been dropped
    ///
    /// Returns false if connections remain after `timeout`.
    pub fn wait_until_empty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.connections.is_empty() {
            if self.emptied.wait_until(&mut inner, deadline).timed_out() {
                return inner.connections.is_empty();
            }
        }
        true
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a connection in the registry for as long as it lives
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: u64,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
