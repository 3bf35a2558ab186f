//! End-to-end checks of the forecasting pipeline on realistic ticket batches.

mod common;

use chrono::Days;
use common::{day, scenario_batch, scenario_records, scenario_today};
use rstest::rstest;
use serde_json::json;
use ticket_forecast::{
    ml::forecasting::{
        compute_forecast_from_json, compute_forecast_report, compute_forecast_series, FitMethod,
        HORIZON_DAYS,
    },
    models::TicketRecord,
};

#[test]
fn scenario_produces_actuals_then_linear_projection() {
    let series = compute_forecast_series(&scenario_records(), 1, scenario_today());

    assert_eq!(series.len(), 3 + HORIZON_DAYS as usize);
    assert_eq!(series[0].date, day(2025, 1, 1));

    let actuals: Vec<_> = series[..3].iter().map(|b| b.actual_count).collect();
    assert_eq!(actuals, vec![Some(2), Some(0), Some(4)]);
    assert!(series[..3].iter().all(|b| b.predicted_count.is_none()));

    // slope 1, intercept 1 over x = 0, 1, 2
    let predicted: Vec<_> = series[3..].iter().map(|b| b.predicted_count).collect();
    let expected: Vec<Option<u64>> = (3u64..10).map(|x| Some(x + 1)).collect();
    assert_eq!(predicted, expected);
    assert_eq!(series[3].date, day(2025, 1, 4));
    assert_eq!(series[3].predicted_count, Some(4));
}

#[test]
fn scenario_report_exposes_the_fit() {
    let report = compute_forecast_report(&scenario_records(), 1, scenario_today());
    let fit = report.fit.as_ref().expect("three observed days are enough to fit");

    assert_eq!(fit.method, FitMethod::NormalEquations);
    assert!((fit.slope() - 1.0).abs() < 1e-9);
    assert!((fit.intercept() - 1.0).abs() < 1e-9);
    assert_eq!(report.accepted_records, 6);
    assert_eq!(report.observed_total(), 6);
}

#[test]
fn exact_linear_trend_is_recovered() {
    // y_i = 2i + 3 for five observed days
    let start = day(2025, 3, 1);
    let mut records = Vec::new();
    for i in 0..5u64 {
        let date = start.checked_add_days(Days::new(i)).unwrap();
        for n in 0..(2 * i + 3) {
            records.push(TicketRecord::new(
                format!("{}-{}", i, n),
                format!("{}T10:00:00Z", date),
            ));
        }
    }
    let today = day(2025, 3, 5);

    let report = compute_forecast_report(&records, 1, today);
    let fit = report.fit.as_ref().unwrap();
    assert!((fit.slope() - 2.0).abs() < 1e-9);
    assert!((fit.intercept() - 3.0).abs() < 1e-9);

    for bucket in report.series.iter().filter(|b| b.date > today) {
        assert_eq!(bucket.predicted_count, Some(2 * bucket.index as u64 + 3));
    }
}

#[test]
fn empty_batch_gives_empty_series() {
    assert!(compute_forecast_series(&[], 1, scenario_today()).is_empty());
}

#[test]
fn single_record_today_is_not_forecasted() {
    let records = vec![TicketRecord::new("only", "2025-01-03T11:00:00Z")];
    let report = compute_forecast_report(&records, 1, scenario_today());

    assert!(report.fit.is_none());
    assert_eq!(report.series.len(), 1 + HORIZON_DAYS as usize);
    assert_eq!(report.series[0].actual_count, Some(1));
    assert!(report.series[1..]
        .iter()
        .all(|b| b.actual_count.is_none() && b.predicted_count.is_none()));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn series_shape_holds_for_any_degree(#[case] degree: usize) {
    let report = compute_forecast_report(&scenario_records(), degree, scenario_today());
    let series = &report.series;

    for pair in series.windows(2) {
        assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
        assert_eq!(pair[0].index + 1, pair[1].index);
    }
    for bucket in series {
        assert!(!(bucket.actual_count.is_some() && bucket.predicted_count.is_some()));
        if bucket.date <= scenario_today() {
            assert!(bucket.actual_count.is_some());
        } else {
            assert!(bucket.predicted_count.is_some());
        }
    }
}

#[test]
fn sparse_data_with_high_degree_falls_back_to_linear() {
    // two observed days cannot support a cubic
    let records = vec![
        TicketRecord::new(1, "2025-01-02"),
        TicketRecord::new(2, "2025-01-03"),
        TicketRecord::new(3, "2025-01-03"),
    ];
    let report = compute_forecast_report(&records, 3, scenario_today());

    let fit = report.fit.as_ref().expect("fallback still fits");
    assert_eq!(fit.method, FitMethod::SimpleRegressionFallback);
    assert!(report.used_fallback());
    assert!(report
        .series
        .iter()
        .filter(|b| b.date > scenario_today())
        .all(|b| b.predicted_count.is_some()));
}

#[test]
fn declining_trend_is_clamped_at_zero() {
    let mut records = Vec::new();
    for n in 0..10 {
        records.push(TicketRecord::new(format!("a{}", n), "2025-01-01"));
    }
    for n in 0..5 {
        records.push(TicketRecord::new(format!("b{}", n), "2025-01-02"));
    }
    let report = compute_forecast_report(&records, 1, day(2025, 1, 3));

    // slope -5, intercept 10: every projection is negative
    let future: Vec<_> = report
        .series
        .iter()
        .filter(|b| b.date > day(2025, 1, 3))
        .collect();
    assert!(!future.is_empty());
    assert!(future.iter().all(|b| b.predicted_count == Some(0)));
}

#[test]
fn invalid_and_future_records_are_dropped() {
    let batch = json!({
        "tickets": [
            { "id": 1, "createdAt": "2025-01-01" },
            { "id": 2, "createdAt": "yesterday" },
            { "id": 3 },
            { "id": 4, "createdAt": "2025-01-09" },
            "not a ticket",
            { "id": 5, "createdAt": "2025-01-02" }
        ]
    });

    let report = compute_forecast_from_json(batch, 1, scenario_today()).unwrap();

    assert_eq!(report.total_records, 5);
    assert_eq!(report.accepted_records, 2);
    assert_eq!(report.invalid_records, 2);
    assert_eq!(report.future_dated_records, 1);
    assert_eq!(report.observed_total(), 2);
}

#[test]
fn json_batch_matches_typed_records() {
    let from_json = compute_forecast_from_json(scenario_batch(), 1, scenario_today()).unwrap();
    let typed = compute_forecast_report(&scenario_records(), 1, scenario_today());
    assert_eq!(from_json.series, typed.series);
}

#[test]
fn identical_input_serializes_identically() {
    let first = compute_forecast_series(&scenario_records(), 1, scenario_today());
    let second = compute_forecast_series(&scenario_records(), 1, scenario_today());

    let a = serde_json::to_string(&first).unwrap();
    let b = serde_json::to_string(&second).unwrap();
    assert_eq!(a, b);
    assert!(a.starts_with(r#"[{"date":"2025-01-01""#));
    assert!(a.contains(r#""predictedCount":4"#));
    assert!(!a.contains("null"));
}
