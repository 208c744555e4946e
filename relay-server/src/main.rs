//! Hookrelay server - receives signed webhooks and relays accepted ones.
//!
//! Configuration comes from the environment:
//! - `SECRETS`: `path,secret,path,secret,...` (required)
//! - `FORWARD`: downstream URL; without it deliveries are only logged
//! - `PORT`, `REQUEST_TIMEOUT_MS`, `FORWARD_TIMEOUT_MS`, `CONNECTION_TIMEOUT_MS`

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookrelay::web::{router, serve, AppState, ConnectionLimits};
use hookrelay::{Config, DeliveryProcessor, Forwarder, RetryPolicy, SecretRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_starting");

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        secret_paths = config.secrets.len(),
        forward_configured = config.forward_url.is_some(),
        request_timeout_ms = config.request_timeout_ms,
        connection_timeout_ms = config.connection_timeout_ms,
        "config_loaded"
    );

    let registry = SecretRegistry::from_secrets(
        config
            .secrets
            .iter()
            .map(|entry| (entry.path.as_str(), entry.secret.as_str())),
    )
    .context("Invalid secret table")?;

    let processor = match &config.forward_url {
        Some(url) => {
            let forwarder = Forwarder::new(
                url.clone(),
                Duration::from_millis(config.forward_timeout_ms),
                RetryPolicy::default(),
            )
            .context("Failed to create HTTP client")?;

            forwarder
                .probe()
                .await
                .context("Forward target is not reachable")?;

            info!(target_url = %url, "forwarding_enabled");
            DeliveryProcessor::Forward(forwarder)
        }
        None => {
            info!("forwarding_disabled");
            DeliveryProcessor::LogOnly
        }
    };

    let request_timeout = Duration::from_millis(config.request_timeout_ms);
    let app = router(AppState::new(registry, processor, request_timeout));
    let limits = ConnectionLimits {
        header_read_timeout: request_timeout,
        connection_timeout: Duration::from_millis(config.connection_timeout_ms),
    };

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_listening");

    // Run server with graceful shutdown
    serve(listener, app, limits, shutdown_signal()).await;

    info!("relay_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}
