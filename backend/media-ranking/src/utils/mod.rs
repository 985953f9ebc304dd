// Utility functions for media-ranking

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fractional days between `then` and `now`.
/// Future timestamps clamp to 0 so clock skew never yields negative ages.
pub fn days_since(now: DateTime<Utc>, then: DateTime<Utc>) -> f64 {
    let seconds = (now - then).num_seconds().max(0) as f64;
    seconds / SECONDS_PER_DAY
}

/// Linear decay from 1.0 at age 0 down to `floor` at `horizon_days`.
pub fn linear_decay(age_days: f64, horizon_days: f64, floor: f64) -> f64 {
    if horizon_days <= 0.0 {
        return floor;
    }
    (1.0 - age_days / horizon_days).max(floor)
}

/// log10(count + 1): diminishing returns for large counts, 0 for no views.
pub fn log_popularity(count: u64) -> f64 {
    (count as f64 + 1.0).log10()
}

/// Comparator for descending float order; NaN compares equal.
pub fn desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}
