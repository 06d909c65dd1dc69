//! API route definitions
//!
//! - /api/v1/health - liveness
//! - /api/v1/status - battery, mode, window, queue and counters
//! - /api/v1/window - current rolling window contents
//! - /api/v1/anomalies - recent anomalies
//! - /api/v1/battery/threshold - change the return-to-base threshold
//! - /api/v1/battery/reset - recharge and resume forwarding

use axum::{routing::{get, post}, Router};

use super::handlers::{self, ControlState};

pub fn api_routes() -> Router<ControlState> {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/status", get(handlers::get_status))
        .route("/window", get(handlers::get_window))
        .route("/anomalies", get(handlers::get_anomalies))
        // External commands
        .route("/battery/threshold", post(handlers::set_threshold))
        .route("/battery/reset", post(handlers::reset_battery))
}
