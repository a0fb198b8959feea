/// Time-windowed rolling sums over irregularly-sampled series.
///
/// The rainfall status rules operate on a 72-hour accumulation, but
/// stations sample nominally every 15 minutes with gaps, retries, and
/// backfills, so the accumulator cannot assume a fixed cadence. It is
/// purely numeric: missing values contribute zero to the sum, and the
/// caller remains responsible for distinguishing "no data" from "zero
/// rainfall" when classifying or displaying.

use chrono::{DateTime, Duration, Utc};

/// Computes, for each input timestamp `t`, the sum of values over all
/// points whose timestamp lies in `(t - window, t]`.
///
/// Duplicate timestamps (retries, backfills) are deduplicated before
/// windowing, keeping the last value seen for each instant. `None`
/// values count as 0.0. Empty input yields empty output.
pub fn rolling_sum(
    points: &[(DateTime<Utc>, Option<f64>)],
    window: Duration,
) -> Vec<(DateTime<Utc>, f64)> {
    if points.is_empty() {
        return Vec::new();
    }

    // Dedup by timestamp, keeping the last value. A stable sort keeps
    // same-timestamp entries in input order so "last" is well defined
    // even if the caller's ordering was imperfect.
    let mut deduped: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(points.len());
    let mut sorted: Vec<(DateTime<Utc>, Option<f64>)> = points.to_vec();
    sorted.sort_by_key(|(ts, _)| *ts);

    for (ts, value) in sorted {
        let value = value.unwrap_or(0.0);
        match deduped.last_mut() {
            Some((last_ts, last_value)) if *last_ts == ts => *last_value = value,
            _ => deduped.push((ts, value)),
        }
    }

    // Sliding window over the deduplicated series. `lo` tracks the first
    // index still inside (t - window, t]; the lower bound is exclusive.
    let mut result = Vec::with_capacity(deduped.len());
    let mut lo = 0;
    let mut sum = 0.0;

    for i in 0..deduped.len() {
        let (ts, value) = deduped[i];
        sum += value;

        while deduped[lo].0 <= ts - window {
            sum -= deduped[lo].1;
            lo += 1;
        }

        result.push((ts, sum));
    }

    result
}

/// Convenience for the cycle path: the accumulated value at the most
/// recent point, or `None` when the series is empty.
pub fn latest_sum(
    points: &[(DateTime<Utc>, Option<f64>)],
    window: Duration,
) -> Option<f64> {
    rolling_sum(points, window).last().map(|(_, sum)| *sum)
}
