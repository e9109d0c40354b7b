//! TCP Server
//!
//! Accepts connections, hands each one to its own thread, and coordinates
//! graceful shutdown.
//!
//! ## Shutdown Sequence
//! 1. Shutdown flag flips; the accept loop stops taking connections
//! 2. Permit pool closes, getWhen waits are cancelled, read halves are shut
//!    so idle sessions end while in-flight requests still get their reply
//! 3. Wait up to the grace period for the registry to empty, then force-close
//! 4. Write the final snapshot
//!
//! Connections that were accepted but still queued for a permit when
//! shutdown begins are closed without being served.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{GateError, Result};
use crate::store::Cancellation;

use super::{Connection, ConnectionRegistry, PermitPool, Registration};

/// How long to let force-closed sessions unwind before snapshotting
const FORCE_CLOSE_SETTLE: Duration = Duration::from_secs(1);

/// TCP server for GateKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    permits: Arc<PermitPool>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listener
    ///
    /// The listener is non-blocking so the accept loop can observe shutdown.
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        if config.permits == 0 {
            return Err(GateError::Config(
                "permit pool size must be at least 1".to_string(),
            ));
        }

        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        let permits = Arc::new(PermitPool::new(config.permits));

        Ok(Self {
            config,
            engine,
            listener,
            registry: Arc::new(ConnectionRegistry::new()),
            permits,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the accept loop until shutdown, then drain and snapshot
    pub fn run(&self) -> Result<()> {
        tracing::info!(
            "Listening on {} with {} permits",
            self.local_addr()?,
            self.permits.capacity()
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.spawn_session(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(self.config.accept_poll_interval);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(self.config.accept_poll_interval);
                }
            }
        }

        self.drain_and_close()
    }

    /// Ask the accept loop to stop; `run` then performs the shutdown sequence
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// A handle that can trigger shutdown from another thread or a signal
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of accepted connections that have not finished yet
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    pub fn permits(&self) -> &PermitPool {
        &self.permits
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let peer_addr = addr.to_string();

        // Some platforms hand out accepted sockets in the listener's mode
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Dropping {}: cannot make socket blocking: {}", peer_addr, e);
            return;
        }

        let cancel = Cancellation::new();
        let registration = match self.registry.register(&stream, &peer_addr, cancel.clone()) {
            Ok(registration) => registration,
            Err(e) => {
                tracing::warn!("Dropping {}: cannot register connection: {}", peer_addr, e);
                return;
            }
        };

        let id = registration.id();
        tracing::debug!("Accepted connection {} from {}", id, peer_addr);

        let worker = Worker {
            engine: Arc::clone(&self.engine),
            permits: Arc::clone(&self.permits),
            registration,
            cancel,
            read_timeout_ms: self.config.read_timeout_ms,
            write_timeout_ms: self.config.write_timeout_ms,
        };

        let spawned = thread::Builder::new()
            .name(format!("gatekv-conn-{}", id))
            .spawn(move || worker.run(stream, peer_addr));

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn worker for connection {}: {}", id, e);
        }
    }

    fn drain_and_close(&self) -> Result<()> {
        tracing::info!(
            "Shutting down: draining {} connections (grace {:?})",
            self.registry.len(),
            self.config.shutdown_grace
        );

        self.permits.close();
        self.registry.cancel_all();
        self.engine.store().wake_all();
        self.registry.shutdown_reads();

        if self.registry.wait_until_empty(self.config.shutdown_grace) {
            tracing::info!("All sessions finished");
        } else {
            let remaining = self.registry.close_all();
            tracing::warn!("Force-closed {} sessions after grace period", remaining);
            if !self.registry.wait_until_empty(FORCE_CLOSE_SETTLE) {
                tracing::warn!("{} sessions still unwinding", self.registry.len());
            }
        }

        self.engine.close()?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Clonable trigger for graceful shutdown
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The underlying flag, for `signal_hook::flag::register`
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything one session thread owns
struct Worker {
    engine: Arc<Engine>,
    permits: Arc<PermitPool>,
    registration: Registration,
    cancel: Cancellation,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
}

impl Worker {
    fn run(self, stream: TcpStream, peer_addr: String) {
        let id = self.registration.id();

        let permit = match self.permits.acquire() {
            Some(permit) => permit,
            None => {
                tracing::debug!("Connection {} ({}) closed before admission", id, peer_addr);
                return;
            }
        };

        tracing::debug!(
            "Admitted connection {} ({}), {} of {} permits in use",
            id,
            peer_addr,
            self.permits.in_use(),
            self.permits.capacity()
        );

        let result = Connection::new(stream, self.engine, self.cancel).and_then(|mut conn| {
            conn.set_timeouts(self.read_timeout_ms, self.write_timeout_ms)?;
            conn.handle()
        });

        match result {
            Ok(()) => tracing::debug!("Connection {} ({}) closed", id, peer_addr),
            Err(e) => tracing::warn!("Connection {} ({}) ended with error: {}", id, peer_addr, e),
        }

        drop(permit);
    }
}
