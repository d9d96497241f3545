//! coachvault HTTP server
//!
//! A standalone server binary serving the unlock API over HTTP from a JSON
//! snapshot document.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coachvault::config::ServerConfig;
use coachvault::engine::UnlockEngine;
use coachvault::guard::{GuardConfig, GuardPolicy, RateGuard, RateLimit};
use coachvault::storage::{open_store, SnapshotStore, StorageError};
use coachvault::transport::router;
use coachvault::{EconomyConfig, Snapshot, UnlockService};

/// Serve the coach unlock API.
#[derive(Debug, Parser)]
#[command(name = "coachvault-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "COACHVAULT_BIND", default_value = "127.0.0.1:3001")]
    bind: SocketAddr,

    /// Path of the JSON snapshot document.
    #[arg(long, env = "COACHVAULT_DATA", default_value = "./db.json")]
    data: PathBuf,

    /// Unlock throttle window in milliseconds.
    #[arg(long, env = "COACHVAULT_UNLOCK_WINDOW_MS", default_value_t = RateLimit::UNLOCK_WINDOW_MS)]
    unlock_window_ms: u64,

    /// Unlock requests allowed per window and key.
    #[arg(long, env = "COACHVAULT_UNLOCK_MAX", default_value_t = RateLimit::UNLOCK_MAX_REQUESTS)]
    unlock_max: u32,

    /// Most rate windows tracked at once.
    #[arg(long, env = "COACHVAULT_MAX_KEYS", default_value_t = GuardConfig::DEFAULT_MAX_KEYS)]
    max_keys: usize,

    /// How often expired rate windows are swept, in milliseconds.
    #[arg(long, env = "COACHVAULT_SWEEP_INTERVAL_MS", default_value_t = 60_000)]
    sweep_interval_ms: u64,

    /// Write an empty snapshot if the document does not exist yet.
    #[arg(long)]
    init_empty: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            data_path: self.data,
            unlock_limit: RateLimit::new(self.unlock_window_ms, self.unlock_max),
            guard: GuardConfig {
                max_keys: self.max_keys,
            },
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            ..ServerConfig::default()
        }
    }
}

fn check_document(store: &dyn SnapshotStore, init_empty: bool) -> Result<(), StorageError> {
    match store.load() {
        Ok(snapshot) => {
            info!(
                users = snapshot.users.len(),
                items = snapshot.items.len(),
                records = snapshot.history.len(),
                "snapshot loaded"
            );
            for violation in snapshot.integrity_violations() {
                warn!(%violation, "snapshot integrity");
            }
            Ok(())
        }
        Err(StorageError::Missing(path)) if init_empty => {
            info!(%path, "writing empty snapshot");
            store.save(&Snapshot::new(EconomyConfig::default()))
        }
        Err(StorageError::Missing(path)) => {
            warn!(%path, "snapshot document not found; requests will fail until it is seeded");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let init_empty = args.init_empty;
    let config = args.into_config().validate()?;

    info!(version = env!("CARGO_PKG_VERSION"), data = %config.data_path.display(), "starting coachvault");

    // Holds an exclusive lock on the document for the process lifetime.
    let store = Arc::new(open_store(&config.data_path, Some(config.persistent))?);
    check_document(store.as_ref(), init_empty)?;

    let engine = UnlockEngine::new(store);
    let guard = Arc::new(RateGuard::new(config.guard));
    let policy = GuardPolicy::unlock().with_limit(config.unlock_limit);
    let service = UnlockService::new(engine, Arc::clone(&guard), policy);

    let sweeper = {
        let guard = Arc::clone(&guard);
        let period = config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                guard.sweep_expired();
            }
        })
    };

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        router(service).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = signal::ctrl_c().await;
    })
    .await?;

    sweeper.abort();
    info!("shut down");
    Ok(())
}
