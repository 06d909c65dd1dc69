//! HTTP control surface using Axum
//!
//! Exposes the drone's status and the two external commands (threshold
//! change, battery reset) under `/api/v1`.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ControlState;

use anyhow::{Context, Result};
use axum::http::{header, Method};
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Restrictive by default. `DRONE_CORS_ORIGINS` takes a comma-separated list
/// of origins allowed to call the API from a browser.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var("DRONE_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Complete control router.
pub fn create_app(state: ControlState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

/// Serve the control API until `cancel_token` fires.
pub async fn serve(
    addr: SocketAddr,
    state: ControlState,
    cancel_token: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control API on {addr}"))?;
    tracing::info!(addr = %addr, "Control API listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await
        .context("Control API server failed")
}
