//! GateKV Server Binary
//!
//! Starts the TCP server for GateKV.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gatekv::network::Server;
use gatekv::{Config, Engine};
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag as signal_flag;
use tracing_subscriber::{fmt, EnvFilter};

/// GateKV Server
#[derive(Parser, Debug)]
#[command(name = "gatekv-server")]
#[command(about = "Authenticated in-memory key-value server")]
#[command(version)]
struct Args {
    /// Number of sessions served concurrently
    permits: usize,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:12345")]
    listen: String,

    /// User directory snapshot file
    #[arg(long, default_value = "data/users.snap")]
    users_snapshot: String,

    /// Key-value store snapshot file
    #[arg(long, default_value = "data/store.snap")]
    store_snapshot: String,

    /// Seconds in-flight sessions get to finish on shutdown
    #[arg(long, default_value = "10")]
    grace_secs: u64,

    /// Write a snapshot every N seconds (0 = only on shutdown)
    #[arg(long, default_value = "0")]
    checkpoint_secs: u64,

    /// Give up on a getWhen after N seconds (0 = wait indefinitely)
    #[arg(long, default_value = "0")]
    get_when_timeout_secs: u64,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gatekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    if args.permits == 0 {
        eprintln!("error: the permit count must be a positive integer");
        return ExitCode::FAILURE;
    }

    tracing::info!("GateKV Server v{}", gatekv::VERSION);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Permits: {}", args.permits);

    let config = Config::builder()
        .listen_addr(&args.listen)
        .permits(args.permits)
        .users_snapshot(&args.users_snapshot)
        .store_snapshot(&args.store_snapshot)
        .shutdown_grace(Duration::from_secs(args.grace_secs))
        .checkpoint_interval(non_zero_secs(args.checkpoint_secs))
        .get_when_timeout(non_zero_secs(args.get_when_timeout_secs))
        .build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            return ExitCode::FAILURE;
        }
    };

    // First signal starts a graceful shutdown; a second one exits immediately
    let shutdown_flag = server.shutdown_handle().flag();
    for signal in TERM_SIGNALS {
        let registered = signal_flag::register_conditional_shutdown(*signal, 1, Arc::clone(&shutdown_flag))
            .and_then(|_| signal_flag::register(*signal, Arc::clone(&shutdown_flag)));
        if let Err(e) = registered {
            tracing::error!("Failed to install handler for signal {}: {}", signal, e);
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
