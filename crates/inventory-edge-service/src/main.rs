//! Inventory edge HTTP service.
//!
//! # Endpoints
//!
//! - `GET /` - database health query
//! - `GET|POST /inventory` - list or create items
//! - `GET|PUT|DELETE /inventory/{id}` - read, update or delete an item
//! - `GET /metrics` on `METRICS_PORT` - Prometheus metrics
//!
//! # Configuration
//!
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `INVENTORY_DB_URL`, `INVENTORY_DB_BACKEND`, `INVENTORY_DB_ORIGIN`,
//!   `INVENTORY_SECRET_KEY`, `INVENTORY_HEALTH_TTL` - see `EdgeConfig`
//! - `FAUNA_ACCESS_KEY` - database secret (name set by `INVENTORY_SECRET_KEY`)
//! - `LOG_FORMAT`, `RUST_LOG`, `SERVICE_NAME` - logging
//! - `METRICS_ENABLED`, `METRICS_PORT` - metrics

use std::env;
use std::net::SocketAddr;

use inventory_edge_lib::EdgeConfig;
use inventory_edge_service::{
    build_router, init_logging, init_metrics, metrics_router, AppState, LoggingConfig,
    MetricsConfig,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env();
    init_logging(&logging_config)?;

    let metrics_config = MetricsConfig::from_env();
    let metrics_enabled = match init_metrics(&metrics_config) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "continuing without metrics");
            false
        }
    };

    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let config = EdgeConfig::from_env();
    info!(
        service = %logging_config.service,
        database_url = %config.database_url,
        backend = %config.backend,
        backend_origin = %config.backend_origin,
        port,
        "starting inventory edge service"
    );

    let state = AppState::from_config(config).map_err(|e| {
        error!(error = %e, "failed to build edge context");
        e
    })?;

    if metrics_enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics_config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %addr, "metrics listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, metrics_router()).await {
                error!(error = %e, "metrics listener stopped");
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
