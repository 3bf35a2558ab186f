use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of days projected beyond today.
pub const HORIZON_DAYS: u64 = 7;

/// One calendar day of the forecast series.
///
/// Days up to and including today carry `actual_count`; later days carry
/// `predicted_count` once the projector has run. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    #[schema(example = "2025-01-03")]
    pub date: NaiveDate,
    /// Offset in days from the first day of the span
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_count: Option<u64>,
}

impl DayBucket {
    pub fn is_observed(&self) -> bool {
        self.actual_count.is_some()
    }
}

/// Last day of the span for a given `today`.
pub fn horizon_end(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(HORIZON_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

/// Buckets record days into one entry per calendar day from the earliest
/// record to `today + HORIZON_DAYS`.
///
/// Days after `today` are never counted; callers filter them out beforehand.
/// No dates on or before `today` means no span and an empty series.
pub fn aggregate_daily(dates: &[NaiveDate], today: NaiveDate) -> Vec<DayBucket> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for date in dates.iter().filter(|date| **date <= today) {
        *counts.entry(*date).or_insert(0) += 1;
    }

    let Some(first) = counts.keys().next().copied() else {
        return Vec::new();
    };
    let last = horizon_end(today);

    first
        .iter_days()
        .take_while(|date| *date <= last)
        .enumerate()
        .map(|(index, date)| {
            let observed = date <= today;
            DayBucket {
                date,
                index,
                actual_count: observed.then(|| counts.get(&date).copied().unwrap_or(0)),
                predicted_count: None,
            }
        })
        .collect()
}
