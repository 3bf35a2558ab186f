use super::aggregation::DayBucket;
use super::least_squares::FitResult;

/// Turns a raw polynomial estimate into a ticket count.
///
/// Rounds half away from zero and clamps at zero. NaN projects to zero and
/// `+inf` saturates.
pub fn clamp_count(estimate: f64) -> u64 {
    let rounded = estimate.round();
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else {
        rounded as u64
    }
}

/// Predicted count at a series index.
pub fn project_count(fit: &FitResult, index: usize) -> u64 {
    clamp_count(fit.evaluate(index as f64))
}

/// Fills `predicted_count` on every unobserved bucket.
///
/// Without a fit the buckets are returned untouched, leaving the future
/// unforecasted.
pub fn project_series(buckets: Vec<DayBucket>, fit: Option<&FitResult>) -> Vec<DayBucket> {
    let Some(fit) = fit else {
        return buckets;
    };

    buckets
        .into_iter()
        .map(|bucket| {
            if bucket.is_observed() {
                bucket
            } else {
                DayBucket {
                    predicted_count: Some(project_count(fit, bucket.index)),
                    ..bucket
                }
            }
        })
        .collect()
}
