/// Collector trait and pre-store reading hygiene.
///
/// Collectors may return partial data (some stations missing), nothing
/// at all, or delayed readings. Readings older than the freshness
/// threshold are treated as absent rather than classified, so a stalled
/// upstream degrades to SEM DADOS instead of freezing the last status.

use chrono::{DateTime, Duration, Utc};

use crate::model::{CollectError, Reading};

/// One upstream data source. Implementations wrap whatever vendor API or
/// file drop supplies readings; the daemon only sees this trait.
pub trait Collector: Send + Sync {
    /// Source name used in log lines.
    fn name(&self) -> &str;

    /// Fetches the readings available for the current cycle. `now` is
    /// passed in so implementations can bound their requests.
    fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<Reading>, CollectError>;
}

/// Drops readings older than `max_age`. Future-dated readings (clock
/// skew upstream) are kept; only staleness is filtered here.
pub fn filter_fresh(readings: Vec<Reading>, now: DateTime<Utc>, max_age: Duration) -> Vec<Reading> {
    readings
        .into_iter()
        .filter(|r| now - r.timestamp <= max_age)
        .collect()
}

/// Merges per-collector batches into one deterministic sequence, sorted
/// by (station_id, timestamp). Fetch parallelism must not change what
/// gets persisted, so the merge order is fixed regardless of arrival
/// order.
pub fn merge_sorted(batches: Vec<Vec<Reading>>) -> Vec<Reading> {
    let mut merged: Vec<Reading> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| {
        a.station_id
            .cmp(&b.station_id)
            .then(a.timestamp.cmp(&b.timestamp))
    });
    merged
}
