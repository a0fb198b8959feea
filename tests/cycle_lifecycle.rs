/// End-to-end cycle tests: a synthetic multi-day rainfall stream driven
/// through the full fetch → store → rolling sum → rule engine →
/// transition → notification pipeline, cycle by cycle.
///
/// The stream rains a constant 0.5 mm per 15-minute reading, so the
/// 72-hour accumulation is an exact multiple of 0.5 at every cycle and
/// the band-crossing instants can be computed by hand:
///
///   ramp (cycle k, k readings so far = k+1):  sum = 0.5 * (k+1)
///     k =  99 → 50.0 → LIVRE (bands are upper-inclusive)
///     k = 100 → 50.5 → ATENÇÃO
///     k = 138 → 69.5 → ALERTA
///     k = 178 → 89.5 → PARALIZAÇÃO
///   after cycle 291 the rain stops (0.0 mm readings) and old readings
///   age out of the window:  sum = 0.5 * (579 - k)
///     k = 401 → 89.0 → ALERTA
///     k = 441 → 69.0 → ATENÇÃO
///     k = 479 → 50.0 → LIVRE
///
/// Run with: cargo test --test cycle_lifecycle

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

use geomon_service::config::StationConfig;
use geomon_service::daemon::{Daemon, DaemonConfig};
use geomon_service::db::Store;
use geomon_service::ingest::collector::Collector;
use geomon_service::ingest::fixtures;
use geomon_service::logging::{EventLog, LogLevel};
use geomon_service::model::{CollectError, Reading, Status};
use geomon_service::notify::{NotificationSender, NotifyError, TransitionEvent};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const RAMP_CYCLES: i64 = 292; // 73 hours of 15-minute cycles
const TOTAL_CYCLES: i64 = 481; // ramp + drain past the LIVRE crossing

struct LiveCollector {
    batch: Mutex<Vec<Reading>>,
}

impl Collector for LiveCollector {
    fn name(&self) -> &str {
        "live"
    }

    fn fetch(&self, _now: DateTime<Utc>) -> Result<Vec<Reading>, CollectError> {
        Ok(std::mem::take(&mut *self.batch.lock().unwrap()))
    }
}

struct CountingSender {
    delivered: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl NotificationSender for CountingSender {
    fn channel(&self) -> &str {
        "counting"
    }

    fn send(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn test_station() -> StationConfig {
    StationConfig {
        station_id: "EST-01".to_string(),
        name: "Talude Norte".to_string(),
        location: "test".to_string(),
        baseline_1m: fixtures::FIXTURE_BASELINES.0,
        baseline_2m: fixtures::FIXTURE_BASELINES.1,
        baseline_3m: fixtures::FIXTURE_BASELINES.2,
    }
}

/// Expected accumulation at cycle k, from the closed-form description
/// above rather than from the code under test.
fn expected_sum(k: i64) -> f64 {
    if k < RAMP_CYCLES {
        0.5 * (k + 1).min(288) as f64
    } else {
        0.5 * (579 - k).max(0) as f64
    }
}

/// The threshold table, restated independently of the rule engine.
fn expected_status(sum: f64) -> Status {
    if sum > 89.0 {
        Status::Paralizacao
    } else if sum > 69.0 {
        Status::Alerta
    } else if sum > 50.0 {
        Status::Atencao
    } else {
        Status::Livre
    }
}

fn wait_until(deadline_ms: u64, mut done: impl FnMut() -> bool) {
    for _ in 0..deadline_ms / 10 {
        if done() {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

// ---------------------------------------------------------------------------
// End-to-end ramp + drain
// ---------------------------------------------------------------------------

#[test]
fn test_threshold_crossings_match_table_over_full_stream() {
    let base = fixtures::base_time();
    let collector = Arc::new(LiveCollector {
        batch: Mutex::new(Vec::new()),
    });
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let store = Store::open_in_memory().expect("in-memory store");
    let log = EventLog::new(store.clone(), LogLevel::Warning).without_console();
    let config = DaemonConfig {
        status_snapshot_path: None,
        ..Default::default()
    };
    let mut daemon = Daemon::new(
        config,
        store,
        log,
        vec![collector.clone() as Arc<dyn Collector>],
        vec![Box::new(CountingSender {
            delivered: delivered.clone(),
        })],
    );
    daemon
        .initialize_with(vec![test_station()])
        .expect("initialize");

    let mut transition_log: Vec<(i64, Status, Status)> = Vec::new();
    let mut last_status = Status::SemDados;

    for k in 0..TOTAL_CYCLES {
        let now = base + Duration::minutes(15 * k);
        let rain = if k < RAMP_CYCLES { 0.5 } else { 0.0 };
        *collector.batch.lock().unwrap() =
            vec![fixtures::rainfall_reading("EST-01", now, Some(rain))];

        daemon.run_cycle(now);

        let status = daemon.statuses()["EST-01"].status;
        assert_eq!(
            status,
            expected_status(expected_sum(k)),
            "cycle {} (sum {:.1} mm): wrong status",
            k,
            expected_sum(k)
        );

        if status != last_status {
            transition_log.push((k, last_status, status));
            last_status = status;
        }
    }

    // The complete status trajectory, with each crossing at its exact cycle.
    assert_eq!(
        transition_log,
        vec![
            (0, Status::SemDados, Status::Livre),
            (100, Status::Livre, Status::Atencao),
            (138, Status::Atencao, Status::Alerta),
            (178, Status::Alerta, Status::Paralizacao),
            (401, Status::Paralizacao, Status::Alerta),
            (441, Status::Alerta, Status::Atencao),
            (479, Status::Atencao, Status::Livre),
        ]
    );

    // Exactly two external notifications across the entire stream: the
    // critical entry into PARALIZAÇÃO and the ATENÇÃO → LIVRE recovery.
    wait_until(2000, || delivered.lock().unwrap().len() >= 2);
    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 2, "alert storm or missing notification");

    assert_eq!(delivered[0].old_status, Status::Alerta);
    assert_eq!(delivered[0].new_status, Status::Paralizacao);
    assert_eq!(delivered[1].old_status, Status::Atencao);
    assert_eq!(delivered[1].new_status, Status::Livre);
}

// ---------------------------------------------------------------------------
// Status persistence across restart
// ---------------------------------------------------------------------------

#[test]
fn test_persisted_status_survives_daemon_restart() {
    let base = fixtures::base_time();
    let store = Store::open_in_memory().expect("in-memory store");
    let log = EventLog::new(store.clone(), LogLevel::Warning).without_console();

    // First daemon: ingest enough rain to reach ATENÇÃO.
    let ramp = fixtures::rainfall_ramp("EST-01", base, 72, 0.25); // 72 mm total
    let collector: Arc<dyn Collector> = Arc::new(fixtures::ScriptedCollector::new(
        "scripted",
        vec![Ok(ramp)],
    ));
    let config = || DaemonConfig {
        status_snapshot_path: None,
        freshness_threshold_minutes: 73 * 60,
        ..Default::default()
    };

    let now = base + Duration::hours(72);
    {
        let mut daemon = Daemon::new(
            config(),
            store.clone(),
            log.clone(),
            vec![collector],
            Vec::new(),
        );
        daemon
            .initialize_with(vec![test_station()])
            .expect("initialize");
        daemon.run_cycle(now);
        assert_eq!(daemon.statuses()["EST-01"].status, Status::Alerta);
    }

    // Second daemon over the same store: the persisted status is the
    // starting point for transition detection, not SEM DADOS.
    let mut restarted = Daemon::new(config(), store, log, Vec::new(), Vec::new());
    restarted
        .initialize_with(vec![test_station()])
        .expect("initialize after restart");

    assert_eq!(restarted.statuses()["EST-01"].status, Status::Alerta);
    assert_eq!(restarted.statuses()["EST-01"].risk_level, 2);
}
