/// Test fixtures: deterministic synthetic reading streams.
///
/// Stations sample every 15 minutes, so fixture generators emit on that
/// cadence from a fixed base instant. Used by unit tests across the
/// crate and by the integration tests under tests/; kept out of
/// cfg(test) so both can share them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;

use crate::ingest::collector::Collector;
use crate::model::{CollectError, Reading};

/// Fixed base instant all fixture streams start from.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

/// Default baselines used by fixture stations (percent at 1m/2m/3m).
pub const FIXTURE_BASELINES: (f64, f64, f64) = (20.0, 24.0, 27.0);

/// One rainfall-only reading with fixture baselines.
pub fn rainfall_reading(
    station_id: &str,
    timestamp: DateTime<Utc>,
    rainfall_mm: Option<f64>,
) -> Reading {
    Reading {
        station_id: station_id.to_string(),
        timestamp,
        rainfall_mm,
        rainfall_accum_mm: None,
        moisture_1m_pct: None,
        moisture_2m_pct: None,
        moisture_3m_pct: None,
        baseline_1m: FIXTURE_BASELINES.0,
        baseline_2m: FIXTURE_BASELINES.1,
        baseline_3m: FIXTURE_BASELINES.2,
    }
}

/// One full reading with explicit moisture values.
pub fn moisture_reading(
    station_id: &str,
    timestamp: DateTime<Utc>,
    moisture: (Option<f64>, Option<f64>, Option<f64>),
) -> Reading {
    Reading {
        station_id: station_id.to_string(),
        timestamp,
        rainfall_mm: Some(0.0),
        rainfall_accum_mm: None,
        moisture_1m_pct: moisture.0,
        moisture_2m_pct: moisture.1,
        moisture_3m_pct: moisture.2,
        baseline_1m: FIXTURE_BASELINES.0,
        baseline_2m: FIXTURE_BASELINES.1,
        baseline_3m: FIXTURE_BASELINES.2,
    }
}

/// Constant-rate rainfall stream: one reading every 15 minutes for
/// `hours` hours, each carrying `mm_per_reading`. With a 72-hour window
/// the accumulation ramps linearly (4 readings/hour), which makes band
/// crossing instants easy to compute in tests.
pub fn rainfall_ramp(
    station_id: &str,
    start: DateTime<Utc>,
    hours: i64,
    mm_per_reading: f64,
) -> Vec<Reading> {
    let samples = hours * 4;
    (0..samples)
        .map(|i| {
            rainfall_reading(
                station_id,
                start + Duration::minutes(15 * i),
                Some(mm_per_reading),
            )
        })
        .collect()
}

/// Collector that replays pre-scripted batches, one per fetch call.
/// Once the script runs out it returns empty batches, and an entry of
/// `Err` simulates a transient upstream failure for that cycle.
pub struct ScriptedCollector {
    name: String,
    batches: Mutex<std::collections::VecDeque<Result<Vec<Reading>, CollectError>>>,
}

impl ScriptedCollector {
    pub fn new(name: &str, batches: Vec<Result<Vec<Reading>, CollectError>>) -> Self {
        Self {
            name: name.to_string(),
            batches: Mutex::new(batches.into()),
        }
    }
}

impl Collector for ScriptedCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, _now: DateTime<Utc>) -> Result<Vec<Reading>, CollectError> {
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
