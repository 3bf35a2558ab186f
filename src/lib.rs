//! Ticket Forecast Library
//!
//! Daily ticket-volume aggregation and least-squares forecasting, plus the
//! HTTP service that keeps a forecast refreshed.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware_helpers;
pub mod ml;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use crate::health::StartTime;
use crate::services::{ForecastService, InMemoryTicketSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub forecast: Arc<ForecastService>,
    /// Set when records are fed through the API instead of fetched remotely.
    pub feed: Option<Arc<InMemoryTicketSource>>,
    pub started: StartTime,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new().nest("/tickets/forecast", handlers::forecast::forecast_routes())
}

/// Full application router with middleware applied.
pub fn app_router(state: AppState) -> Router {
    let cors_layer = if state.config.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::<AppState>::new()
        .route("/", get(|| async { "ticket-forecast up" }))
        .route(
            "/metrics",
            get(|| async move {
                match metrics::metrics_handler().await {
                    Ok(body) => (StatusCode::OK, body),
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        String::from("metrics error"),
                    ),
                }
            }),
        )
        .nest("/health", health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::openapi_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors_layer)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn response_meta_serializes_camel_case() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-json"), async {
                ApiResponse::success(())
            })
            .await;

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["meta"]["requestId"], "meta-json");
        assert!(value["meta"].get("request_id").is_none());
    }

    #[test]
    fn response_outside_request_has_no_request_id() {
        let response = ApiResponse::success(1);
        assert!(response.meta.unwrap().request_id.is_none());
    }
}
