use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ticket Forecast API",
        version = "0.2.1",
        description = r#"
# Ticket Volume Forecast API

Daily support-ticket counts with a short-horizon trend forecast.

The forecast series covers every day from the earliest ticket through seven days
after today. Days up to today carry `actualCount`; later days carry
`predictedCount` once at least two days have been observed.

## Error Handling

Errors use a consistent JSON body:

```json
{
  "error": "Bad Request",
  "message": "Forecast error: Malformed ticket batch: expected an array of ticket records",
  "requestId": "req-abc123xyz",
  "timestamp": "2025-01-03T10:30:00Z"
}
```
"#
    ),
    tags(
        (name = "Forecast", description = "Ticket volume forecasting")
    ),
    paths(
        crate::handlers::forecast::get_latest_forecast,
        crate::handlers::forecast::get_latest_series,
        crate::handlers::forecast::compute_forecast,
        crate::handlers::forecast::refresh_forecast,
        crate::handlers::forecast::replace_records,
    ),
    components(
        schemas(
            crate::services::ForecastSnapshot,
            crate::services::RefreshFailure,
            crate::ml::forecasting::ForecastReport,
            crate::ml::forecasting::DayBucket,
            crate::ml::forecasting::FitResult,
            crate::ml::forecasting::FitMethod,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
