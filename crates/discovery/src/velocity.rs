//! Mention velocity: percent change between two consecutive equal-length windows.

use chrono::{DateTime, Duration, Utc};

/// Percent change from `previous` to `current`, rounded to 2 decimals.
///
/// Growth from zero counts as +100%; no data in either window is 0%.
pub fn velocity_change_pct(current: u64, previous: u64) -> f64 {
    let pct = if previous > 0 {
        (current as f64 - previous as f64) / previous as f64 * 100.0
    } else if current > 0 {
        100.0
    } else {
        0.0
    };
    (pct * 100.0).round() / 100.0
}

/// The window immediately before the current one: `[now - 2L, now - L)`.
pub fn prior_window(now: DateTime<Utc>, lookback_hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let lookback = Duration::hours(lookback_hours);
    (now - lookback - lookback, now - lookback)
}
