//! Configuration for GateKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a GateKV server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Number of sessions that may be served at the same time.
    /// Accepted connections beyond this wait for a permit.
    pub permits: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// How often the non-blocking accept loop checks for shutdown
    pub accept_poll_interval: Duration,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// How often a blocked getWhen re-checks its cancellation and peer
    pub wait_poll_interval: Duration,

    /// Upper bound on a single getWhen wait (None = wait indefinitely)
    pub get_when_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Snapshot Configuration
    // -------------------------------------------------------------------------
    /// Snapshot of the user directory
    pub users_snapshot: PathBuf,

    /// Snapshot of the key-value store
    pub store_snapshot: PathBuf,

    /// Periodic checkpoint interval (None = only snapshot at shutdown)
    pub checkpoint_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Shutdown Configuration
    // -------------------------------------------------------------------------
    /// How long in-flight sessions get to finish before being force-closed
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:12345".to_string(),
            permits: 16,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            accept_poll_interval: Duration::from_millis(50),
            wait_poll_interval: Duration::from_millis(200),
            get_when_timeout: None,
            users_snapshot: PathBuf::from("data/users.snap"),
            store_snapshot: PathBuf::from("data/store.snap"),
            checkpoint_interval: None,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the admission permit pool size
    pub fn permits(mut self, count: usize) -> Self {
        self.config.permits = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn accept_poll_interval(mut self, interval: Duration) -> Self {
        self.config.accept_poll_interval = interval;
        self
    }

    pub fn wait_poll_interval(mut self, interval: Duration) -> Self {
        self.config.wait_poll_interval = interval;
        self
    }

    /// Bound every getWhen wait
    pub fn get_when_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.get_when_timeout = timeout;
        self
    }

    /// Place both snapshot files inside `dir`
    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.config.users_snapshot = dir.join("users.snap");
        self.config.store_snapshot = dir.join("store.snap");
        self
    }

    pub fn users_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.users_snapshot = path.into();
        self
    }

    pub fn store_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_snapshot = path.into();
        self
    }

    /// Enable periodic checkpoints
    pub fn checkpoint_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.checkpoint_interval = interval;
        self
    }

    /// Set the shutdown drain grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
