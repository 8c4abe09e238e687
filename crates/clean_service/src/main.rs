mod config;
mod http;
mod metrics;

use crate::config::Config;
use crate::http::AppState;
use crate::metrics::Metrics;
use anyhow::Context;
use clap::Parser;
use compactness::{CompactnessFilter, TransverseMercator};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::parse();
    config.validate()?;
    tracing::info!(config = ?config, "Loaded configuration");

    // Built once; every request shares it read-only.
    let projection = TransverseMercator::from_epsg(config.target_epsg)
        .with_context(|| format!("Cannot measure in EPSG:{}", config.target_epsg))?;
    let target_epsg = projection.epsg();
    let filter = CompactnessFilter::with_default_threshold(projection, config.default_k_threshold);

    let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);
    let state = Arc::new(AppState {
        filter,
        metrics: metrics.clone(),
    });
    let cors = http::cors_layer(&config.cors_allowed_origins)?;
    let app = http::router(state, cors);

    // Both listeners are bound up front so a taken port fails startup.
    let metrics_listener = bind(config.metrics_listen_addr, "metrics server").await?;
    let listener = bind(config.listen_addr, "HTTP API").await?;

    // Spawn the metrics server
    let metrics_handle = {
        let router = metrics.router();
        let addr = config.metrics_listen_addr;
        tokio::spawn(async move {
            tracing::info!(addr = %addr, "Metrics server started");
            if let Err(e) = axum::serve(metrics_listener, router.into_make_service()).await {
                tracing::error!(error = %e, "Metrics server failed");
            }
        })
    };

    tracing::info!(
        addr = %config.listen_addr,
        target_epsg = ?target_epsg,
        "Clean service listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    metrics_handle.abort();
    tracing::info!("Clean service shut down gracefully.");
    Ok(())
}

async fn bind(addr: SocketAddr, what: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {what} on {addr}"))
}

/// Listens for OS shutdown signals (SIGINT, SIGTERM) and resolves when one is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received.");
}
