//! Control API handlers
//!
//! Read-only views of the drone state plus the two external commands
//! (`setThreshold`, `resetBattery`). Every handler goes through
//! [`DroneState`]; none of them touch the containers directly.

use super::envelope::{reply, ApiError};
use crate::pipeline::DroneState;
use crate::types::{Anomaly, Reading};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::Uri;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Anomalies returned when no `limit` is given.
pub const DEFAULT_ANOMALY_LIMIT: usize = 50;

/// Shared state for all control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub drone: Arc<DroneState>,
}

impl ControlState {
    pub fn new(drone: Arc<DroneState>) -> Self {
        Self { drone }
    }
}

// ============================================================================
// Read-only views
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub drone: String,
}

/// GET /api/v1/health
pub async fn get_health(State(state): State<ControlState>) -> Response {
    reply(&state.drone, HealthResponse {
        status: "ok",
        drone: state.drone.name().to_string(),
    })
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ControlState>) -> Response {
    reply(&state.drone, state.drone.status())
}

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    pub len: usize,
    pub avg_temp: f64,
    pub avg_humid: f64,
    /// Oldest first
    pub readings: Vec<Reading>,
}

/// GET /api/v1/window
pub async fn get_window(State(state): State<ControlState>) -> Response {
    let (readings, (avg_temp, avg_humid)) = state.drone.window_view();
    reply(&state.drone, WindowResponse {
        len: readings.len(),
        avg_temp,
        avg_humid,
        readings,
    })
}

#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AnomaliesResponse {
    /// Total anomalies recorded since startup
    pub total: usize,
    /// Most recent anomalies, oldest first
    pub anomalies: Vec<Anomaly>,
}

/// GET /api/v1/anomalies?limit=N
pub async fn get_anomalies(
    State(state): State<ControlState>,
    Query(query): Query<AnomalyQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_ANOMALY_LIMIT);
    reply(&state.drone, AnomaliesResponse {
        total: state.drone.anomaly_count(),
        anomalies: state.drone.recent_anomalies(limit),
    })
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetThresholdRequest {
    pub threshold: f64,
}

/// POST /api/v1/battery/threshold
///
/// Takes effect on the next battery tick. Lowering the threshold never
/// brings a returning drone back; use reset for that.
pub async fn set_threshold(
    State(state): State<ControlState>,
    payload: Result<Json<SetThresholdRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected threshold request body");
            return ApiError::from(rejection).reply(&state.drone);
        }
    };

    match state.drone.set_threshold(request.threshold) {
        Ok(battery) => reply(&state.drone, battery),
        Err(e) => {
            warn!(threshold = request.threshold, error = %e, "Rejected threshold change");
            ApiError::from(e).reply(&state.drone)
        }
    }
}

/// POST /api/v1/battery/reset
pub async fn reset_battery(State(state): State<ControlState>) -> Response {
    let battery = state.drone.reset_battery();
    reply(&state.drone, battery)
}

/// Any unmatched path.
pub async fn not_found(State(state): State<ControlState>, uri: Uri) -> Response {
    ApiError::UnknownRoute(uri.path().to_string()).reply(&state.drone)
}
