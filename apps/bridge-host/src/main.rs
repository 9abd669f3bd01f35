use bridge_host::error::HostError;
use bridge_host::logger::initialize as LoggerInitialize;
use bridge_host::paths;
use bridge_host::workspace::{self, Workspace};

use bridge_core::BridgeConfig;
use bridge_core::push::{ConnectionHealth, HealthReport, StateRoot};
use bridge_core::ws::start_bridge_server;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use log::{error, info, warn};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), HostError> {
    let log_dir = paths::log_dir()?;
    create_dir_all(&log_dir).map_err(|e| HostError::Host {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Bridge host starting");
    info!("Log directory: {}", log_dir.display());

    let config_dir = paths::config_dir()?;
    let config = BridgeConfig::load(&config_dir)?;
    info!(
        "Loaded bridge config from {} (dedup window {}, ready method '{}')",
        config_dir.display(),
        config.router.dedup_window,
        config.router.ready_method
    );

    let state = StateRoot::new(Workspace::new("Untitled"));
    let session_config = config.clone();
    let handle = start_bridge_server(&config.server, move |transport| {
        let controller = workspace::controller(&session_config, &state, transport);
        log_health_changes(controller.subscribe_health());
        controller
    })
    .await?;

    info!("Bridge server ready on port {}", handle.port());

    tokio::signal::ctrl_c().await.map_err(|e| HostError::Host {
        message: format!("Failed to listen for shutdown signal: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Shutdown requested");
    handle.shutdown().await;
    Ok(())
}

/// Log each session's health transitions until the session's ledger is dropped.
fn log_health_changes(mut health: watch::Receiver<HealthReport>) {
    tokio::spawn(async move {
        let mut last = health.borrow().status;
        while health.changed().await.is_ok() {
            let report = health.borrow_and_update().clone();
            if report.status == last {
                continue;
            }
            last = report.status;

            let detail = report.last_error.as_deref().unwrap_or("none");
            match report.status {
                ConnectionHealth::Healthy => info!("Session healthy again"),
                ConnectionHealth::Degraded => warn!("Session degraded: {}", detail),
                ConnectionHealth::Disconnected => error!(
                    "Session disconnected after {} failures: {}",
                    report.consecutive_failures, detail
                ),
            }
        }
    });
}
