/*!
 * # Metrics Module
 *
 * Prometheus metrics for the forecasting service, exposed in text format at
 * `/metrics`.
 *
 * ## Metrics
 *
 * - `ticket_forecast_refresh_total{outcome}`: refresh cycles by outcome
 * - `ticket_forecast_records_total{status}`: records seen per cycle, by status
 * - `ticket_forecast_fallback_fits_total`: fits that used simple regression
 * - `ticket_forecast_unforecasted_total`: cycles with too little data to fit
 * - `ticket_forecast_compute_seconds`: pipeline duration
 */

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use thiserror::Error;

use crate::ml::forecasting::ForecastReport;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    static ref REFRESH_CYCLES: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "ticket_forecast_refresh_total",
                "Forecast refresh cycles by outcome"
            ),
            &["outcome"]
        )
        .expect("metric can be created")
    );
    static ref RECORDS: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "ticket_forecast_records_total",
                "Ticket records processed by forecasting cycles"
            ),
            &["status"]
        )
        .expect("metric can be created")
    );
    static ref FALLBACK_FITS: IntCounter = register(
        IntCounter::new(
            "ticket_forecast_fallback_fits_total",
            "Fits that fell back to simple linear regression"
        )
        .expect("metric can be created")
    );
    static ref UNFORECASTED: IntCounter = register(
        IntCounter::new(
            "ticket_forecast_unforecasted_total",
            "Cycles with fewer than two observed days"
        )
        .expect("metric can be created")
    );
    static ref COMPUTE_SECONDS: Histogram = register(
        Histogram::with_opts(
            HistogramOpts::new(
                "ticket_forecast_compute_seconds",
                "Time spent computing a forecast"
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
        )
        .expect("metric can be created")
    );
}

fn register<M>(metric: M) -> M
where
    M: Collector + Clone + 'static,
{
    REGISTRY
        .register(Box::new(metric.clone()))
        .expect("metric can be registered");
    metric
}

/// Registers all forecast metrics up front so `/metrics` lists them before
/// the first cycle runs.
pub fn init_metrics() {
    lazy_static::initialize(&REFRESH_CYCLES);
    lazy_static::initialize(&RECORDS);
    lazy_static::initialize(&FALLBACK_FITS);
    lazy_static::initialize(&UNFORECASTED);
    lazy_static::initialize(&COMPUTE_SECONDS);
}

/// How a refresh cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published,
    Superseded,
    SourceError,
}

impl RefreshOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Published => "published",
            RefreshOutcome::Superseded => "superseded",
            RefreshOutcome::SourceError => "source_error",
        }
    }
}

pub fn record_refresh(outcome: RefreshOutcome) {
    REFRESH_CYCLES.with_label_values(&[outcome.as_str()]).inc();
}

pub fn record_report(report: &ForecastReport, elapsed: Duration) {
    RECORDS
        .with_label_values(&["accepted"])
        .inc_by(report.accepted_records as u64);
    RECORDS
        .with_label_values(&["invalid"])
        .inc_by(report.invalid_records as u64);
    RECORDS
        .with_label_values(&["future_dated"])
        .inc_by(report.future_dated_records as u64);
    RECORDS
        .with_label_values(&["out_of_span"])
        .inc_by(report.out_of_span_records as u64);

    if report.used_fallback() {
        FALLBACK_FITS.inc();
    }
    if !report.is_forecasted() {
        UNFORECASTED.inc();
    }
    COMPUTE_SECONDS.observe(elapsed.as_secs_f64());
}

/// Renders every registered metric in Prometheus text format.
pub fn render() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}

pub async fn metrics_handler() -> Result<String, MetricsError> {
    render()
}
