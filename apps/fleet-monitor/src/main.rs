//! # Fleet Monitor
//!
//! Headless host for the sync engine. Loads configuration, starts the engine
//! and logs each published state until Ctrl+C.
//!
//! ## Usage
//! ```text
//! fleet-monitor [CONFIG_PATH]
//!
//! RUST_LOG=fleet_sync=trace fleet-monitor ./fleet.toml
//! FLEET_API_URL=http://localhost:3000 FLEET_PUSH_ENABLED=false fleet-monitor
//! ```

use std::path::PathBuf;

use tracing::{error, info, warn, Subscriber};
use tracing_subscriber::EnvFilter;

use fleet_sync::{FleetConfig, SyncEngine, SyncState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = FleetConfig::load_or_default(config_path);
    info!(
        api = %config.api.base_url,
        push = %config.push.url,
        push_enabled = config.push.enabled,
        "Configuration loaded"
    );

    let engine = match SyncEngine::from_config(config) {
        Ok(engine) => engine,
        Err(e) if e.is_config_error() => {
            error!(error = %e, "Invalid configuration, check fleet.toml and FLEET_* variables");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    engine.start().await?;

    let mut states = engine.subscribe();
    let mut labels = engine.subscribe_freshness();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                log_state(&state, &labels.borrow());
            }

            changed = labels.changed() => {
                if changed.is_err() {
                    break;
                }
                let label = labels.borrow_and_update().clone();
                tracing::debug!(last_updated = %label, "Freshness");
            }

            _ = &mut shutdown => break,
        }
    }

    engine.shutdown().await;
    info!("Fleet monitor stopped");
    Ok(())
}

const DEFAULT_FILTER: &str = "info,fleet=debug";

fn init_tracing() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing::subscriber::set_global_default(subscriber(filter))
}

/// Formatting subscriber gated only by `filter`.
fn subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt().with_env_filter(filter).finish()
}

fn log_state(state: &SyncState, freshness: &str) {
    let Some(stats) = state.statistics else {
        info!(loading = state.loading, connection = %state.connection_status, "Waiting for data");
        return;
    };
    let summary = stats.summary();

    info!(
        shown = state.vehicles.len(),
        filter = state.active_filter.as_ref().map(|s| s.as_str()).unwrap_or("all"),
        total = stats.total,
        idle = stats.idle,
        en_route = stats.en_route,
        delivered = stats.delivered,
        maintenance = stats.maintenance,
        avg_speed = %format_args!("{:.1}", stats.average_speed),
        active_routes = summary.active_routes,
        completed = summary.completed,
        connection = %state.connection_status,
        last_updated = freshness,
        "Fleet state"
    );

    if let Some(error) = &state.error {
        warn!(phase = ?state.phase, %error, "Showing stale data");
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_env_filter_gates_dependency_noise() {
        tracing::subscriber::with_default(subscriber(EnvFilter::new("warn")), || {
            assert!(!tracing::enabled!(target: "hyper::proto", Level::TRACE));
            assert!(!tracing::enabled!(target: "fleet_sync::push", Level::INFO));
            assert!(tracing::enabled!(target: "fleet_sync::push", Level::WARN));
        });
    }

    #[test]
    fn test_default_filter_levels() {
        tracing::subscriber::with_default(subscriber(EnvFilter::new(DEFAULT_FILTER)), || {
            assert!(tracing::enabled!(target: "fleet_sync::engine", Level::DEBUG));
            assert!(!tracing::enabled!(target: "tungstenite::protocol", Level::DEBUG));
            assert!(tracing::enabled!(target: "reqwest::connect", Level::INFO));
        });
    }
}
