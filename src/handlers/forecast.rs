use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    config::validate_degree,
    errors::ServiceError,
    ml::forecasting::{DayBucket, ForecastReport},
    models::decode_ticket_batch,
    services::ForecastSnapshot,
    ApiResponse, ApiResult, AppState,
};

/// Build the forecast Router scoped under `/api/v1/tickets/forecast`.
pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_latest_forecast).post(compute_forecast))
        .route("/series", get(get_latest_series))
        .route("/refresh", post(refresh_forecast))
        .route("/records", post(replace_records))
}

/// Query parameters for on-demand forecasts
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
pub struct ForecastQuery {
    /// Polynomial degree (default: the configured degree)
    #[param(minimum = 0, maximum = 6)]
    #[validate(custom = "validate_degree")]
    pub degree: Option<usize>,
}

async fn latest_snapshot(state: &AppState) -> Result<ForecastSnapshot, ServiceError> {
    state
        .forecast
        .latest()
        .await
        .map(|snapshot| (*snapshot).clone())
        .ok_or_else(|| ServiceError::NotFound("no forecast has been computed yet".to_string()))
}

/// Latest published forecast
#[utoipa::path(
    get,
    path = "/api/v1/tickets/forecast",
    responses(
        (status = 200, description = "Latest forecast snapshot", body = ApiResponse<ForecastSnapshot>),
        (status = 404, description = "No forecast computed yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecast"
)]
pub async fn get_latest_forecast(State(state): State<AppState>) -> ApiResult<ForecastSnapshot> {
    let snapshot = latest_snapshot(&state).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Daily series of the latest published forecast
#[utoipa::path(
    get,
    path = "/api/v1/tickets/forecast/series",
    responses(
        (status = 200, description = "Latest daily series", body = ApiResponse<Vec<DayBucket>>),
        (status = 404, description = "No forecast computed yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecast"
)]
pub async fn get_latest_series(State(state): State<AppState>) -> ApiResult<Vec<DayBucket>> {
    let snapshot = latest_snapshot(&state).await?;
    Ok(Json(ApiResponse::success(snapshot.report.series)))
}

/// Forecast a caller-supplied batch without publishing it
#[utoipa::path(
    post,
    path = "/api/v1/tickets/forecast",
    params(ForecastQuery),
    request_body(content = Value, description = "Array of ticket records, or an object with a `data` or `tickets` array"),
    responses(
        (status = 200, description = "Forecast for the submitted batch", body = ApiResponse<ForecastReport>),
        (status = 400, description = "Invalid degree or malformed batch", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecast"
)]
pub async fn compute_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastQuery>,
    Json(body): Json<Value>,
) -> ApiResult<ForecastReport> {
    params.validate()?;
    let degree = params.degree.unwrap_or_else(|| state.forecast.degree());

    let records = decode_ticket_batch(body)?;
    let report = state.forecast.compute(&records, degree);

    Ok(Json(ApiResponse::success(report)))
}

/// Run a refresh cycle now
#[utoipa::path(
    post,
    path = "/api/v1/tickets/forecast/refresh",
    responses(
        (status = 200, description = "Snapshot current after the refresh", body = ApiResponse<ForecastSnapshot>),
        (status = 502, description = "Ticket source unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecast"
)]
pub async fn refresh_forecast(State(state): State<AppState>) -> ApiResult<ForecastSnapshot> {
    let snapshot = state.forecast.refresh().await?;
    Ok(Json(ApiResponse::success((*snapshot).clone())))
}

/// Replace the in-memory ticket batch and refresh
#[utoipa::path(
    post,
    path = "/api/v1/tickets/forecast/records",
    request_body(content = Value, description = "Array of ticket records, or an object with a `data` or `tickets` array"),
    responses(
        (status = 200, description = "Snapshot computed from the new batch", body = ApiResponse<ForecastSnapshot>),
        (status = 400, description = "Malformed batch, or the service reads from a remote source", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecast"
)]
pub async fn replace_records(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<ForecastSnapshot> {
    let feed = state.feed.as_ref().ok_or_else(|| {
        ServiceError::BadRequest(
            "ticket records are read from a remote source and cannot be replaced".to_string(),
        )
    })?;

    let records = decode_ticket_batch(body)?;
    info!(records = records.len(), "replacing in-memory ticket batch");
    feed.replace(records).await;

    let snapshot = state.forecast.refresh().await?;
    Ok(Json(ApiResponse::success((*snapshot).clone())))
}
