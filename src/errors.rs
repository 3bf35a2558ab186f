use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Simplified error structure for OpenAPI documentation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Not found: no forecast has been computed yet",
    "details": null,
    "requestId": "req-abc123xyz",
    "timestamp": "2025-01-03T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request", "Internal Server Error")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Not found: no forecast has been computed yet")]
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    #[schema(example = "2025-01-03T10:30:00.000Z")]
    pub timestamp: String,
}

/// Failure taxonomy of the forecasting pipeline and its record sources.
///
/// Only `MalformedBatch` and `SourceUnavailable` ever leave the pipeline;
/// the other variants are recovered from where they are raised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    /// A single record's timestamp could not be turned into a calendar date.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Fewer than two observed days; no polynomial can be fitted.
    #[error("Insufficient data: {points} actual data point(s), at least 2 required")]
    InsufficientData { points: usize },

    /// The normal matrix could not be inverted.
    #[error("Singular fit: {0}")]
    SingularFit(String),

    /// The record batch could not be obtained from its source.
    #[error("Ticket source unavailable: {0}")]
    SourceUnavailable(String),

    /// The batch is not a collection of records at the top level.
    #[error("Malformed ticket batch: {0}")]
    MalformedBatch(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forecast(err) => match err {
                ForecastError::MalformedBatch(_) | ForecastError::InvalidTimestamp(_) => {
                    StatusCode::BAD_REQUEST
                }
                ForecastError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
                ForecastError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ForecastError::SingularFit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Server-side failures return generic messages without implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Forecast(ForecastError::SingularFit(_)) => "Internal server error".to_string(),
            Self::Forecast(ForecastError::SourceUnavailable(_)) => {
                "Ticket source unavailable".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.response_message();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let request_id = current_request_id();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error_message,
            details: None,
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
