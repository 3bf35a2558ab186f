//! Property-based tests for the forecasting pipeline.
//!
//! These tests use proptest to verify the series invariants across a wide
//! range of ticket batches.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use ticket_forecast::{
    ml::forecasting::{
        clamp_count, compute_forecast_report, fit_polynomial, horizon_end, HORIZON_DAYS,
    },
    models::TicketRecord,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

// Strategies for generating test data

/// Day offsets relative to today: mostly past, some in the future.
fn offsets_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-60i64..5, 0..200)
}

fn records_from(offsets: &[i64]) -> Vec<TicketRecord> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, offset)| {
            let date = if *offset >= 0 {
                today().checked_add_days(Days::new(*offset as u64))
            } else {
                today().checked_sub_days(Days::new(offset.unsigned_abs()))
            }
            .unwrap();
            TicketRecord::new(i as u64, format!("{}T12:00:00Z", date))
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn series_spans_first_day_through_horizon(offsets in offsets_strategy(), degree in 0usize..4) {
        let records = records_from(&offsets);
        let report = compute_forecast_report(&records, degree, today());
        let series = &report.series;

        let past: Vec<i64> = offsets.iter().copied().filter(|o| *o <= 0).collect();
        match past.iter().min() {
            None => prop_assert!(series.is_empty()),
            Some(min) => {
                let expected_len = (-min) as usize + 1 + HORIZON_DAYS as usize;
                prop_assert_eq!(series.len(), expected_len);
                prop_assert_eq!(series.last().unwrap().date, horizon_end(today()));
            }
        }

        for pair in series.windows(2) {
            prop_assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
        }
    }

    #[test]
    fn actual_counts_sum_to_accepted_records(offsets in offsets_strategy()) {
        let records = records_from(&offsets);
        let report = compute_forecast_report(&records, 1, today());

        let past = offsets.iter().filter(|o| **o <= 0).count();
        prop_assert_eq!(report.accepted_records, past);
        prop_assert_eq!(report.future_dated_records, offsets.len() - past);
        prop_assert_eq!(report.observed_total(), past as u64);
    }

    #[test]
    fn buckets_never_carry_both_counts(offsets in offsets_strategy(), degree in 0usize..4) {
        let records = records_from(&offsets);
        let report = compute_forecast_report(&records, degree, today());
        let observed_days = report.series.iter().filter(|b| b.date <= today()).count();

        for bucket in &report.series {
            prop_assert!(!(bucket.actual_count.is_some() && bucket.predicted_count.is_some()));
            if bucket.date <= today() {
                prop_assert!(bucket.actual_count.is_some());
            } else if observed_days >= 2 {
                prop_assert!(bucket.predicted_count.is_some());
            } else {
                prop_assert!(bucket.predicted_count.is_none());
            }
        }
    }

    #[test]
    fn clamped_counts_are_rounded_and_non_negative(value in -1.0e6f64..1.0e6) {
        let count = clamp_count(value);
        if value <= 0.0 {
            prop_assert_eq!(count, 0);
        } else {
            prop_assert!((count as f64 - value).abs() <= 0.5);
        }
    }

    #[test]
    fn exact_lines_are_recovered(slope in -20i32..20, intercept in -50i32..50, n in 3usize..30) {
        let points: Vec<(f64, f64)> = (0..n)
            .map(|i| (i as f64, slope as f64 * i as f64 + intercept as f64))
            .collect();

        let fit = fit_polynomial(&points, 1).unwrap();
        prop_assert!((fit.slope() - slope as f64).abs() < 1e-6);
        prop_assert!((fit.intercept() - intercept as f64).abs() < 1e-6);
    }
}
