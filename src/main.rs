//! Riverflag - water safety flags for a river-sports club.
//!
//! # API Endpoints
//!
//! - `GET /status` - Current flag with the snapshot and display metrics
//! - `GET /river/history` - Recent flow readings for charting
//! - `GET /health` - Health check
//!
//! Configuration is read from `RIVERFLAG_*` environment variables; see
//! [`riverflag::config`].

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use riverflag::api::{AppState, router};
use riverflag::config::Config;
use riverflag::http::ReqwestFetcher;
use riverflag::service::SafetyService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("riverflag=info".parse()?))
        .init();

    // Load configuration from environment
    let config = Config::from_env()?;

    info!(
        port = config.port,
        measure_id = %config.river.measure_id,
        latitude = config.weather.latitude,
        longitude = config.weather.longitude,
        wind_unit = %config.weather.wind_unit,
        "Starting Riverflag server"
    );
    if config.thresholds_defaulted {
        warn!(
            thresholds = ?config.thresholds,
            "No RIVERFLAG_FLOW_*/RIVERFLAG_WIND_* thresholds set; using illustrative defaults"
        );
    }

    // Create the evaluation service and router
    let service = SafetyService::from_config(&config, Arc::new(ReqwestFetcher::new()));
    let app = router(AppState { service });

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Riverflag is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
