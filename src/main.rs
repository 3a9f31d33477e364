//! TallyKV - An In-Memory Multi-Type Key-Value Store
//!
//! This is the main entry point for the TallyKV server.
//! It loads the last snapshot, starts the background tasks, accepts
//! connections until a shutdown signal arrives and saves a final snapshot.

use anyhow::Context;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tallykv::config::{help_text, CliAction, Config};
use tallykv::connection::ConnectionStats;
use tallykv::persistence::{self, SnapshotConfig, SnapshotSaver};
use tallykv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
use tallykv::{accept_loop, VERSION};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
TallyKV v{} - In-Memory Multi-Type Key-Value Store
──────────────────────────────────────────────────
Server started on {} ({} framing)
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        VERSION,
        config.bind_address(),
        config.framing,
    )
}

/// Loads the snapshot, falling back to an empty store if it can't be read.
fn load_storage(config: &Config) -> StorageEngine {
    let Some(path) = &config.snapshot else {
        return StorageEngine::new();
    };

    match persistence::load(path) {
        Ok(snapshot) => {
            let engine = StorageEngine::new();
            let keys = engine.restore(snapshot);
            info!(path = %path.display(), keys, "Snapshot loaded");
            engine
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load snapshot, starting empty");
            StorageEngine::new()
        }
    }
}

/// Resolves once SIGINT (or SIGTERM on Unix) arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{}", help_text());
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("TallyKV version {}", VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", help_text());
            std::process::exit(1);
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let storage = Arc::new(load_storage(&config));

    let sweeper = ExpirySweeper::start(
        Arc::clone(&storage),
        ExpiryConfig {
            interval: config.sweep_interval,
        },
    );

    let saver = config.snapshot.as_ref().map(|path| {
        SnapshotSaver::start(
            Arc::clone(&storage),
            SnapshotConfig {
                path: path.clone(),
                interval: config.snapshot_interval,
            },
        )
    });

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), framing = %config.framing, "Listening");

    print_banner(&config);

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), config.framing, Arc::clone(&stats)) => {}
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    sweeper.stop();
    if let Some(saver) = saver {
        saver.shutdown().await;
    }

    if let Some(path) = &config.snapshot {
        match persistence::save_engine(&storage, path) {
            Ok(keys) => info!(path = %path.display(), keys, "Final snapshot saved"),
            Err(e) => error!(path = %path.display(), error = %e, "Final snapshot failed"),
        }
    }

    let storage_stats = storage.stats();
    info!(
        keys = storage_stats.keys,
        expired = storage_stats.expired,
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
