//! Ticket-volume forecasting.
//!
//! Raw ticket records go in, a per-day series comes out: observed counts up
//! to `today` and projected counts for the following [`HORIZON_DAYS`] days.
//! Every function here is pure; `today` is always passed in.

pub mod aggregation;
pub mod least_squares;
pub mod projection;
pub mod timestamp;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::ForecastError;
use crate::models::{decode_ticket_batch, TicketRecord};

pub use aggregation::{aggregate_daily, horizon_end, DayBucket, HORIZON_DAYS};
pub use least_squares::{fit_polynomial, FitMethod, FitResult, DEFAULT_DEGREE};
pub use projection::{clamp_count, project_series};
pub use timestamp::normalize_timestamp;

/// Default bound on how far back a record may lie before it is ignored.
pub const DEFAULT_MAX_SPAN_DAYS: u64 = 3650;

/// Outcome of one forecasting cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    #[schema(example = "2025-01-03")]
    pub today: NaiveDate,
    /// Degree that was requested; the fit may have fallen back to 1
    pub requested_degree: usize,
    pub total_records: usize,
    /// Records counted into the series
    pub accepted_records: usize,
    /// Records without a usable timestamp
    pub invalid_records: usize,
    /// Records stamped after `today`
    pub future_dated_records: usize,
    /// Records older than the configured span bound
    #[serde(default)]
    pub out_of_span_records: usize,
    /// `None` when fewer than two days were observed
    pub fit: Option<FitResult>,
    pub series: Vec<DayBucket>,
}

impl ForecastReport {
    pub fn is_forecasted(&self) -> bool {
        self.fit.is_some()
    }

    pub fn used_fallback(&self) -> bool {
        self.fit.as_ref().is_some_and(FitResult::used_fallback)
    }

    pub fn observed_total(&self) -> u64 {
        self.series.iter().filter_map(|b| b.actual_count).sum()
    }

    pub fn predicted_total(&self) -> u64 {
        self.series.iter().filter_map(|b| b.predicted_count).sum()
    }
}

/// Daily series with projections for `records` as of `today`.
pub fn compute_forecast_series(
    records: &[TicketRecord],
    degree: usize,
    today: NaiveDate,
) -> Vec<DayBucket> {
    compute_forecast_report(records, degree, today).series
}

/// Runs the full pipeline and keeps the diagnostics alongside the series.
pub fn compute_forecast_report(
    records: &[TicketRecord],
    degree: usize,
    today: NaiveDate,
) -> ForecastReport {
    run_pipeline(records, degree, today, None)
}

/// Like [`compute_forecast_report`], but ignores records dated more than
/// `max_span_days` before `today` so the series length stays bounded.
pub fn compute_bounded_forecast_report(
    records: &[TicketRecord],
    degree: usize,
    today: NaiveDate,
    max_span_days: u64,
) -> ForecastReport {
    run_pipeline(records, degree, today, span_start(today, max_span_days))
}

/// Earliest day kept under a span bound; `None` when the bound reaches past
/// the calendar.
pub fn span_start(today: NaiveDate, max_span_days: u64) -> Option<NaiveDate> {
    today.checked_sub_days(Days::new(max_span_days))
}

fn run_pipeline(
    records: &[TicketRecord],
    degree: usize,
    today: NaiveDate,
    earliest: Option<NaiveDate>,
) -> ForecastReport {
    let mut dates = Vec::with_capacity(records.len());
    let mut invalid_records = 0;
    let mut future_dated_records = 0;
    let mut out_of_span_records = 0;

    for record in records {
        let parsed = match &record.created_at {
            Some(raw) => normalize_timestamp(raw),
            None => Err(ForecastError::InvalidTimestamp(
                "missing createdAt".to_string(),
            )),
        };
        match parsed {
            Ok(date) if date > today => future_dated_records += 1,
            Ok(date) if earliest.is_some_and(|first| date < first) => {
                debug!(id = %record.id, %date, "ignoring record outside the span bound");
                out_of_span_records += 1;
            }
            Ok(date) => dates.push(date),
            Err(err) => {
                debug!(id = %record.id, error = %err, "dropping ticket record");
                invalid_records += 1;
            }
        }
    }

    let buckets = aggregate_daily(&dates, today);

    let observed: Vec<(f64, f64)> = buckets
        .iter()
        .filter_map(|b| b.actual_count.map(|count| (b.index as f64, count as f64)))
        .collect();

    let fit = match fit_polynomial(&observed, degree) {
        Ok(fit) => Some(fit),
        Err(err) => {
            debug!(error = %err, "leaving future buckets unforecasted");
            None
        }
    };

    ForecastReport {
        today,
        requested_degree: degree,
        total_records: records.len(),
        accepted_records: dates.len(),
        invalid_records,
        future_dated_records,
        out_of_span_records,
        series: project_series(buckets, fit.as_ref()),
        fit,
    }
}

/// Decodes a raw JSON batch and forecasts it.
///
/// Fails only when the batch itself is not a collection of records.
pub fn compute_forecast_from_json(
    batch: Value,
    degree: usize,
    today: NaiveDate,
) -> Result<ForecastReport, ForecastError> {
    let records = decode_ticket_batch(batch)?;
    Ok(compute_forecast_report(&records, degree, today))
}
