#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use ticket_forecast::{
    config::AppConfig,
    health::StartTime,
    models::TicketRecord,
    services::{FixedClock, ForecastService, InMemoryTicketSource, TicketSource},
    AppState,
};
use tower::ServiceExt;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// Reference date used across the integration tests.
pub fn scenario_today() -> NaiveDate {
    day(2025, 1, 3)
}

/// 2025-01-01 ×2, 2025-01-02 ×0, 2025-01-03 ×4.
pub fn scenario_records() -> Vec<TicketRecord> {
    vec![
        TicketRecord::new("t1", "2025-01-01T08:15:00Z"),
        TicketRecord::new("t2", "2025-01-01T17:40:00Z"),
        TicketRecord::new("t3", "2025-01-03T09:00:00Z"),
        TicketRecord::new("t4", "2025-01-03T10:30:00Z"),
        TicketRecord::new("t5", "2025-01-03T12:00:00Z"),
        TicketRecord::new("t6", "2025-01-03T23:59:59Z"),
    ]
}

pub fn scenario_batch() -> Value {
    json!([
        { "id": "t1", "createdAt": "2025-01-01T08:15:00Z" },
        { "id": "t2", "createdAt": "2025-01-01T17:40:00Z" },
        { "_id": "t3", "createdAt": "2025-01-03T09:00:00Z", "subject": "login issue" },
        { "id": "t4", "createdAt": "2025-01-03T10:30:00Z" },
        { "id": "t5", "createdAt": 1735905600000i64 },
        { "id": "t6", "createdAt": "2025-01-03T23:59:59Z" }
    ])
}

/// Helper harness around the application router with an in-memory ticket feed.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub feed: Arc<InMemoryTicketSource>,
}

impl TestApp {
    pub fn new(records: Vec<TicketRecord>) -> Self {
        let feed = Arc::new(InMemoryTicketSource::with_records(records));
        let source: Arc<dyn TicketSource> = feed.clone();
        Self::with_source(source, Some(feed.clone()), feed)
    }

    /// Serve from an arbitrary source; `feed` stays reachable for assertions.
    pub fn with_source(
        source: Arc<dyn TicketSource>,
        api_feed: Option<Arc<InMemoryTicketSource>>,
        feed: Arc<InMemoryTicketSource>,
    ) -> Self {
        let forecast = Arc::new(ForecastService::new(
            source,
            Arc::new(FixedClock::at_date(scenario_today())),
            1,
        ));

        let state = AppState {
            config: AppConfig::default(),
            forecast,
            feed: api_feed,
            started: StartTime::default(),
        };

        Self {
            router: ticket_forecast::app_router(state.clone()),
            state,
            feed,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

pub async fn response_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body is not UTF-8")
}
