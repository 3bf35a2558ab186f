/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - process is up
 * - Readiness check (`/health/ready`) - a forecast snapshot is being served
 * - Version (`/health/version`) - build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::AppState;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

/// Readiness report
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessInfo {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Process start time, used for uptime reporting.
#[derive(Clone, Copy, Debug)]
pub struct StartTime(pub SystemTime);

impl Default for StartTime {
    fn default() -> Self {
        Self(SystemTime::now())
    }
}

impl StartTime {
    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.0)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }
}

/// Create the health check router
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/version", get(version_info))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": HealthStatus::Up,
        "timestamp": Utc::now(),
    }))
}

/// Ready once a snapshot exists. A failed refresh after that only degrades
/// the report since the previous snapshot keeps being served.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let latest = state.forecast.latest().await;
    let last_error = state.forecast.last_error().await;

    let status = match (&latest, &last_error) {
        (None, _) => HealthStatus::Down,
        (Some(_), Some(_)) => HealthStatus::Degraded,
        (Some(_), None) => HealthStatus::Up,
    };

    let info = ReadinessInfo {
        status: status.clone(),
        timestamp: Utc::now(),
        uptime_seconds: state.started.uptime(),
        source: state.forecast.source_description(),
        generation: latest.as_ref().map(|s| s.generation),
        computed_at: latest.as_ref().map(|s| s.computed_at),
        last_error: last_error.map(|failure| failure.message),
    };

    let code = if status == HealthStatus::Down {
        warn!("readiness check failed: no forecast snapshot available");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (code, Json(info))
}

async fn version_info() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
    }))
}
