//! beacond — the Beacon daemon.
//!
//! Single binary that assembles the Beacon subsystems:
//! - Uptime/incident store (redb)
//! - Check registry + execution engine
//! - Recorder loop feeding the store
//! - Status page REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! beacond run --config beacon.toml --port 8080 --data-dir /var/lib/beacon
//! beacond check --config beacon.toml
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use beacon_core::{BeaconConfig, Status};
use beacon_health::{Bonds, Engine, HealthMonitor, RunOptions, checks};
use beacon_state::{Service, StateStore};

#[derive(Parser)]
#[command(name = "beacond", about = "Beacon health monitor and status page daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor loop and serve the status page.
    Run {
        /// Path to beacon.toml.
        #[arg(long, default_value = "beacon.toml")]
        config: PathBuf,

        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run every configured check once and print the report as JSON.
    ///
    /// Exits non-zero when the overall status is down.
    Check {
        /// Path to beacon.toml.
        #[arg(long, default_value = "beacon.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,beacond=debug,beacon=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
        } => {
            run_daemon(&config, port, data_dir).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { config } => run_once(&config).await,
    }
}

fn load_config(path: &Path) -> anyhow::Result<BeaconConfig> {
    let config = BeaconConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), services = config.services.len(), "config loaded");
    Ok(config)
}

/// Build the monitor and register one check per configured service.
///
/// Checks are named after their service, so the returned bindings map
/// each check name to the service id it records into.
fn build_monitor(
    config: &BeaconConfig,
    bonds: &Arc<Bonds>,
) -> anyhow::Result<(Arc<HealthMonitor>, HashMap<String, String>)> {
    let monitor = Arc::new(HealthMonitor::new(Engine::new(config.default_timeout()?)));
    let mut bindings = HashMap::new();

    for svc in &config.services {
        let Some(check) = &svc.check else {
            info!(service = %svc.id, "no check configured; samples must be submitted externally");
            continue;
        };
        if let Some(bond) = checks::missing_bond(check, bonds) {
            warn!(service = %svc.id, %bond, "bond not registered; check reports down until one is");
        }
        let def = checks::from_config(&svc.id, check, bonds)?;
        monitor.register_check(def);
        bindings.insert(svc.id.clone(), svc.id.clone());
    }

    info!(checks = monitor.registry().len(), "checks registered");
    Ok((monitor, bindings))
}

async fn run_daemon(config_path: &Path, port: Option<u16>, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    info!("Beacon daemon starting");

    let config = load_config(config_path)?;
    let port = port.unwrap_or(config.server.port);
    let data_dir = data_dir.unwrap_or_else(|| config.server.data_dir.clone());

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("beacon.redb");

    // ── Initialize subsystems ──────────────────────────────────

    // Store.
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    for svc in &config.services {
        let mut service = Service::new(&svc.id, &svc.name);
        service.description = svc.description.clone();
        store.put_service(&service)?;
    }

    // Providers are wired by the embedding application; the daemon starts
    // with none, so database and cache checks report "bond not configured".
    let bonds = Arc::new(Bonds::new());
    let (monitor, bindings) = build_monitor(&config, &bonds)?;

    let options = RunOptions {
        check_timeout: config.check_timeout()?,
    };
    let interval = config.interval()?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let recorder_handle = monitor.spawn_recorder(store.clone(), bindings, interval, options, shutdown_rx);

    // ── Start API server ───────────────────────────────────────

    let router = beacon_api::build_router(store, monitor);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = recorder_handle.await;

    info!("Beacon daemon stopped");
    Ok(())
}

async fn run_once(config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let bonds = Arc::new(Bonds::new());
    let (monitor, _) = build_monitor(&config, &bonds)?;

    let options = RunOptions {
        check_timeout: config.check_timeout()?,
    };
    let report = monitor.run_all(options).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let overall = report.overall_status();
    if overall == Status::Down {
        warn!(%overall, "one or more checks are down");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
