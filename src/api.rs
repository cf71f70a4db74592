//! HTTP API handlers for Riverflag.
//!
//! The API is a thin read-only surface over [`SafetyService`]: it hands the
//! evaluation value objects to whatever renders them and never derives a
//! verdict of its own.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::model::RiverHistory;
use crate::service::{Evaluation, SafetyService};

/// Longest history window a client may request, in days.
pub const MAX_HISTORY_DAYS: u32 = 28;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: SafetyService,
}

/// Build the router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/river/history", get(get_river_history))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /status - Current flag, snapshot and display metrics.
///
/// # Response
///
/// ```json
/// {
///     "evaluated_at": "2024-06-01T12:10:00Z",
///     "snapshot": { "river": {...}, "weather": {...}, "hour_index": 12, "gust": 5.0, "uv_index": 4.0 },
///     "assessment": { "level": "green", "reason": "...", "triggering_metric": "none" },
///     "metrics": { "flow": 50.0, "temperature_c": 18.0, ... }
/// }
/// ```
///
/// Always answers `200`: an unreachable provider shows up as an `offline`
/// level or a missing metric, not as an HTTP error.
#[instrument(skip(state))]
pub async fn get_status(State(state): State<AppState>) -> Json<Evaluation> {
    let evaluation = state.service.evaluate().await;

    info!(
        level = ?evaluation.assessment.level,
        reason = %evaluation.assessment.reason,
        "Status queried"
    );

    Json(evaluation)
}

/// Query parameters for GET /river/history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Days of history to return (default: 7).
    #[serde(default = "default_history_days")]
    pub days: u32,
}

fn default_history_days() -> u32 {
    7
}

/// GET /river/history - Flow readings for charting.
///
/// Returns `400` for a window outside `1..=28` days and `503` when the gauge
/// could not be read.
#[instrument(skip(state))]
pub async fn get_river_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<RiverHistory>, StatusCode> {
    if query.days == 0 || query.days > MAX_HISTORY_DAYS {
        warn!(days = query.days, "Invalid history window");
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.service.river_history(query.days, Utc::now()).await {
        Some(history) => {
            info!(
                days = query.days,
                readings = history.readings.len(),
                "River history queried"
            );
            Ok(Json(history))
        }
        None => {
            warn!(days = query.days, "River history unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
