use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::errors::ForecastError;

/// Offset-less date-time layouts, read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Resolves a raw `createdAt` value to the UTC calendar day it falls on.
///
/// Accepts ISO-8601 strings (with or without offset, or a bare date), epoch
/// milliseconds, and the `{"$date": ...}` / `{"$numberLong": ...}` wrappers
/// that document stores emit in extended JSON.
pub fn normalize_timestamp(raw: &Value) -> Result<NaiveDate, ForecastError> {
    match raw {
        Value::String(text) => parse_text(text),
        Value::Number(number) => {
            let millis = match number.as_i64() {
                Some(millis) => Some(millis),
                None => number
                    .as_f64()
                    .filter(|millis| millis.is_finite())
                    .filter(|millis| millis.abs() < i64::MAX as f64)
                    .map(|millis| millis.trunc() as i64),
            };
            millis
                .and_then(from_epoch_millis)
                .ok_or_else(|| invalid(raw))
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                return normalize_timestamp(inner);
            }
            match map.get("$numberLong") {
                Some(Value::String(digits)) => digits
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(from_epoch_millis)
                    .ok_or_else(|| invalid(raw)),
                _ => Err(invalid(raw)),
            }
        }
        _ => Err(invalid(raw)),
    }
}

fn parse_text(text: &str) -> Result<NaiveDate, ForecastError> {
    let trimmed = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc).date_naive());
    }
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(parsed.with_timezone(&Utc).date_naive());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.date());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| ForecastError::InvalidTimestamp(format!("unrecognised timestamp {:?}", text)))
}

fn from_epoch_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|instant| instant.date_naive())
}

fn invalid(raw: &Value) -> ForecastError {
    ForecastError::InvalidTimestamp(format!("unsupported timestamp value {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(json!("2025-01-03T10:15:00Z"), day(2025, 1, 3))]
    #[case(json!("2025-01-03T10:15:00.123Z"), day(2025, 1, 3))]
    #[case(json!("2025-01-03T01:00:00+02:00"), day(2025, 1, 2))]
    #[case(json!("2025-01-03T23:30:00-05:00"), day(2025, 1, 4))]
    #[case(json!("2025-01-03 23:30:00+00:00"), day(2025, 1, 3))]
    #[case(json!("2025-01-03T10:15:00"), day(2025, 1, 3))]
    #[case(json!("2025-01-03 10:15:00.5"), day(2025, 1, 3))]
    #[case(json!("2025-01-03T10:15"), day(2025, 1, 3))]
    #[case(json!(" 2025-01-03 "), day(2025, 1, 3))]
    #[case(json!(1735689600000i64), day(2025, 1, 1))]
    #[case(json!(1735689600000.75), day(2025, 1, 1))]
    #[case(json!({"$date": "2025-01-03T10:15:00Z"}), day(2025, 1, 3))]
    #[case(json!({"$date": {"$numberLong": "1735689600000"}}), day(2025, 1, 1))]
    fn parses_supported_timestamps(#[case] raw: Value, #[case] expected: NaiveDate) {
        assert_eq!(normalize_timestamp(&raw).unwrap(), expected);
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!(true))]
    #[case(json!(""))]
    #[case(json!("yesterday"))]
    #[case(json!("2025-13-01"))]
    #[case(json!("2025-02-30T00:00:00Z"))]
    #[case(json!([2025, 1, 3]))]
    #[case(json!({"when": "2025-01-03"}))]
    #[case(json!({"$numberLong": "soon"}))]
    #[case(json!(1e300))]
    fn rejects_unusable_timestamps(#[case] raw: Value) {
        assert_matches!(
            normalize_timestamp(&raw),
            Err(ForecastError::InvalidTimestamp(_))
        );
    }
}
