//! Control API envelope
//!
//! Success is `{ "data": T, "meta": {...} }`, failure is
//! `{ "error": { "code", "message" }, "meta": {...} }`. `meta` names the
//! answering drone and its operating mode at reply time, so a ground station
//! polling several drones can tell replies apart.

use crate::battery::ControlError;
use crate::pipeline::DroneState;
use crate::types::OperatingMode;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// API version reported in every envelope.
pub const API_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct ReplyMeta {
    pub drone: String,
    pub mode: OperatingMode,
    pub api_version: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl ReplyMeta {
    pub fn of(drone: &DroneState) -> Self {
        Self {
            drone: drone.name().to_string(),
            mode: drone.mode(),
            api_version: API_VERSION,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Reply<T> {
    data: T,
    meta: ReplyMeta,
}

/// 200 with `data` wrapped in the envelope.
pub fn reply<T: Serialize>(drone: &DroneState, data: T) -> Response {
    let body = Reply {
        data,
        meta: ReplyMeta::of(drone),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Everything a control request can be refused for.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No such endpoint: {0}")]
    UnknownRoute(String),

    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error(transparent)]
    Control(#[from] ControlError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidBody(_) | ApiError::Control(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::UnknownRoute(_) => "UNKNOWN_ROUTE",
            ApiError::InvalidBody(_) => "INVALID_BODY",
            ApiError::Control(ControlError::ThresholdOutOfRange(_)) => "THRESHOLD_OUT_OF_RANGE",
        }
    }

    /// Error envelope as answered by `drone`.
    pub fn reply(self, drone: &DroneState) -> Response {
        #[derive(Serialize)]
        struct ErrorDetail {
            code: &'static str,
            message: String,
        }

        #[derive(Serialize)]
        struct ErrorReply {
            error: ErrorDetail,
            meta: ReplyMeta,
        }

        let status = self.status();
        let body = ErrorReply {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
            meta: ReplyMeta::of(drone),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StateSettings;

    fn drone() -> DroneState {
        DroneState::new(StateSettings {
            name: "envelope-test".to_string(),
            ..StateSettings::default()
        })
    }

    async fn body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_reply_carries_drone_identity() {
        let resp = reply(&drone(), serde_json::json!({"level": 99.5}));
        assert_eq!(resp.status(), StatusCode::OK);

        let v = body(resp).await;
        assert_eq!(v["data"]["level"], 99.5);
        assert_eq!(v["meta"]["drone"], "envelope-test");
        assert_eq!(v["meta"]["mode"], "Active");
        assert_eq!(v["meta"]["api_version"], API_VERSION);
    }

    #[tokio::test]
    async fn test_control_error_maps_to_threshold_code() {
        let drone = drone();
        let err = ApiError::from(ControlError::ThresholdOutOfRange(120.0));
        let resp = err.reply(&drone);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let v = body(resp).await;
        assert_eq!(v["error"]["code"], "THRESHOLD_OUT_OF_RANGE");
        assert!(v["error"]["message"].as_str().unwrap().contains("120"));
    }

    #[tokio::test]
    async fn test_returning_mode_shows_in_error_meta() {
        let drone = DroneState::new(StateSettings {
            battery_threshold: 100.0,
            ..StateSettings::default()
        });
        drone.battery_tick(0.5);

        let v = body(ApiError::UnknownRoute("/x".to_string()).reply(&drone)).await;
        assert_eq!(v["error"]["code"], "UNKNOWN_ROUTE");
        assert_eq!(v["meta"]["mode"], "Returning");
    }
}
