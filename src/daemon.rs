/// Core daemon implementation for the slope monitoring service.
///
/// This module implements the main cycle loop that:
/// 1. Fetches readings from all configured collectors (in parallel)
/// 2. Filters stale data and appends the rest to the store
/// 3. Derives per-station status from the 72-hour rainfall accumulation
/// 4. Diffs against the persisted status and dispatches notifications
/// 5. Persists statuses and exports the dashboard snapshot
/// 6. Sleeps out the remainder of the cycle period
///
/// The loop is the outermost failure boundary: a failing or panicking
/// cycle is logged and the next cycle runs anyway. Only startup problems
/// (store unreachable, empty station registry) are fatal.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use threadpool::ThreadPool;

use crate::alert::transitions::{self, NotificationKind};
use crate::alert::{moisture, rainfall};
use crate::analysis::rolling;
use crate::config::{self, StationConfig};
use crate::db::{ReadingQuery, Store};
use crate::ingest::collector::{self, Collector};
use crate::logging::{EventLog, SCOPE_GERAL};
use crate::model::{RainfallThresholds, Reading, StationStatus, Status, DEFAULT_MOISTURE_DELTA};
use crate::notify::{NotificationSender, NotifierDispatch, TransitionEvent};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Daemon configuration.
pub struct DaemonConfig {
    /// Cycle period in seconds (default: 900, matching the 15-minute
    /// station sampling interval).
    pub cycle_interval_secs: u64,

    /// Readings older than this are treated as absent (default: 60 min).
    pub freshness_threshold_minutes: i64,

    /// Rolling rainfall accumulation window (default: 72 h).
    pub rainfall_window_hours: i64,

    /// Rainfall status bands.
    pub thresholds: RainfallThresholds,

    /// Moisture trigger delta in percentage points above baseline.
    pub moisture_delta: f64,

    /// Where to export the per-cycle status snapshot for dashboard
    /// consumers. `None` disables the export.
    pub status_snapshot_path: Option<std::path::PathBuf>,

    /// Worker threads for parallel collector fetches.
    pub fetch_threads: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 900,
            freshness_threshold_minutes: 60,
            rainfall_window_hours: 72,
            thresholds: RainfallThresholds::default(),
            moisture_delta: DEFAULT_MOISTURE_DELTA,
            status_snapshot_path: Some(std::path::PathBuf::from("status.json")),
            fetch_threads: 4,
        }
    }
}

impl DaemonConfig {
    /// Default configuration with the snapshot path taken from the
    /// `GEOMON_STATUS_SNAPSHOT` environment variable (loaded from .env
    /// if present) when set.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        if let Ok(path) = std::env::var("GEOMON_STATUS_SNAPSHOT") {
            config.status_snapshot_path = Some(std::path::PathBuf::from(path));
        }
        config
    }
}

// ---------------------------------------------------------------------------
// Cycle summary
// ---------------------------------------------------------------------------

/// What one cycle did, for the summary log line and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    pub readings_inserted: usize,
    pub readings_duplicate: usize,
    pub stations_evaluated: usize,
    pub transitions: usize,
    pub notifications: usize,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Main daemon state.
pub struct Daemon {
    config: DaemonConfig,
    store: Store,
    log: EventLog,
    collectors: Vec<Arc<dyn Collector>>,
    dispatch: NotifierDispatch,
    stations: Vec<StationConfig>,
    statuses: HashMap<String, StationStatus>,
}

impl Daemon {
    /// Builds a daemon over an already-open store. The notifier worker
    /// is spawned here and lives for the daemon's lifetime.
    pub fn new(
        config: DaemonConfig,
        store: Store,
        log: EventLog,
        collectors: Vec<Arc<dyn Collector>>,
        senders: Vec<Box<dyn NotificationSender>>,
    ) -> Self {
        let dispatch = NotifierDispatch::start(senders, log.clone());
        Self {
            config,
            store,
            log,
            collectors,
            dispatch,
            stations: Vec::new(),
            statuses: HashMap::new(),
        }
    }

    /// Initializes from stations.toml and the persisted statuses.
    pub fn initialize(&mut self) -> Result<(), Box<dyn Error>> {
        let stations = config::load_config()?;
        self.initialize_with(stations)
    }

    /// Initializes with an explicit station registry (used by tests and
    /// tooling that loads the registry from a non-default path).
    pub fn initialize_with(&mut self, stations: Vec<StationConfig>) -> Result<(), Box<dyn Error>> {
        if stations.is_empty() {
            return Err("No stations configured".into());
        }

        let persisted = self.store.load_statuses()?;
        let now = Utc::now();

        self.statuses = stations
            .iter()
            .map(|s| {
                let status = persisted
                    .get(&s.station_id)
                    .cloned()
                    .unwrap_or_else(|| StationStatus::new(&s.station_id, Status::SemDados, now));
                (s.station_id.clone(), status)
            })
            .collect();
        self.stations = stations;

        self.log.info(
            SCOPE_GERAL,
            &format!(
                "Daemon inicializado: {} estações, {} coletores",
                self.stations.len(),
                self.collectors.len()
            ),
        );
        Ok(())
    }

    pub fn get_stations(&self) -> &[StationConfig] {
        &self.stations
    }

    /// Current in-memory status mapping (mirrors the persisted rows).
    pub fn statuses(&self) -> &HashMap<String, StationStatus> {
        &self.statuses
    }

    // -----------------------------------------------------------------------
    // Fetch
    // -----------------------------------------------------------------------

    /// Fetches from every collector in parallel and merges the results
    /// deterministically. Per-collector failures are logged and skipped;
    /// their stations simply have no new data this cycle.
    fn fetch_all(&self, now: DateTime<Utc>) -> Vec<Reading> {
        if self.collectors.is_empty() {
            return Vec::new();
        }

        let pool = ThreadPool::new(self.config.fetch_threads.max(1).min(self.collectors.len()));
        let (tx, rx) = mpsc::channel();

        for source in &self.collectors {
            let source = Arc::clone(source);
            let tx = tx.clone();
            pool.execute(move || {
                let result = source.fetch(now);
                // Receiver only drops if the daemon is gone.
                let _ = tx.send((source.name().to_string(), result));
            });
        }
        drop(tx);

        let mut batches = Vec::new();
        for (name, result) in rx {
            match result {
                Ok(readings) => {
                    self.log.debug(
                        SCOPE_GERAL,
                        &format!("Coletor {} retornou {} leituras", name, readings.len()),
                    );
                    batches.push(readings);
                }
                Err(e) => {
                    self.log
                        .error(SCOPE_GERAL, &format!("Falha no coletor {}: {}", name, e));
                }
            }
        }

        let merged = collector::merge_sorted(batches);
        collector::filter_fresh(
            merged,
            now,
            Duration::minutes(self.config.freshness_threshold_minutes),
        )
    }

    // -----------------------------------------------------------------------
    // Status derivation
    // -----------------------------------------------------------------------

    /// Derives the displayed status for one station from the stored
    /// reading window ending at `now`. Also evaluates the hierarchical
    /// moisture engine on the latest reading and logs its verdict.
    fn derive_status(&self, station: &StationConfig, now: DateTime<Utc>) -> Status {
        let window = match self.store.query_at(
            &ReadingQuery {
                station_id: Some(station.station_id.clone()),
                last_hours: Some(self.config.rainfall_window_hours),
                ..Default::default()
            },
            now,
        ) {
            Ok(readings) => readings,
            Err(e) => {
                self.log.error(
                    &station.station_id,
                    &format!("Falha ao consultar histórico: {}", e),
                );
                return Status::SemDados;
            }
        };

        let freshness = Duration::minutes(self.config.freshness_threshold_minutes);
        let latest = window.last();

        // A window with no reading fresher than the threshold means the
        // station is effectively silent, regardless of older history.
        let has_fresh = latest.map(|r| now - r.timestamp <= freshness).unwrap_or(false);

        let accumulated = if has_fresh {
            let points: Vec<(DateTime<Utc>, Option<f64>)> = window
                .iter()
                .map(|r| (r.timestamp, r.rainfall_mm))
                .collect();
            rolling::latest_sum(&points, Duration::hours(self.config.rainfall_window_hours))
        } else {
            None
        };

        let status = rainfall::rainfall_status(accumulated, &self.config.thresholds);

        // The moisture engine runs in parallel with the rainfall rules;
        // its verdict is logged but does not drive the displayed status.
        if let Some(reading) = latest.filter(|_| has_fresh) {
            let moisture_status = moisture::moisture_status(
                reading.moisture_1m_pct,
                reading.moisture_2m_pct,
                reading.moisture_3m_pct,
                reading.baseline_1m,
                reading.baseline_2m,
                reading.baseline_3m,
                self.config.moisture_delta,
            );
            self.log.debug(
                &station.station_id,
                &format!("Status hierárquico de umidade: {}", moisture_status),
            );
        }

        status
    }

    // -----------------------------------------------------------------------
    // Cycle
    // -----------------------------------------------------------------------

    /// Runs one full fetch-compute-persist-notify cycle at the given
    /// instant. All per-station and storage failures are absorbed and
    /// logged; the summary reflects what actually happened.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let readings = self.fetch_all(now);

        match self.store.append(&readings) {
            Ok(outcome) => {
                summary.readings_inserted = outcome.inserted;
                summary.readings_duplicate = outcome.duplicates;
                if outcome.duplicates > 0 {
                    self.log.info(
                        SCOPE_GERAL,
                        &format!(
                            "{} leituras duplicadas ignoradas na persistência",
                            outcome.duplicates
                        ),
                    );
                }
            }
            Err(e) => {
                // Evaluation still proceeds over whatever history the
                // store already holds.
                self.log
                    .error(SCOPE_GERAL, &format!("Falha ao gravar leituras: {}", e));
            }
        }

        for station in &self.stations.clone() {
            summary.stations_evaluated += 1;

            let new_status = self.derive_status(station, now);
            let old_status = self
                .statuses
                .get(&station.station_id)
                .map(|s| s.status)
                .unwrap_or(Status::SemDados);

            let decision = transitions::evaluate(new_status, old_status);

            if new_status != old_status {
                summary.transitions += 1;
                if !decision.should_notify {
                    self.log.info(
                        &station.station_id,
                        &format!("Transição silenciosa: {} -> {}", old_status, new_status),
                    );
                }
            }

            // Status persistence is unconditional and independent of
            // notification outcome. If the write fails the prior status
            // is retained and the next cycle retries the transition.
            let record = StationStatus::new(&station.station_id, new_status, now);
            match self.store.save_status(&record) {
                Ok(()) => {
                    self.statuses.insert(station.station_id.clone(), record);
                }
                Err(e) => {
                    self.log.error(
                        &station.station_id,
                        &format!("Falha ao persistir status: {}", e),
                    );
                }
            }

            if decision.should_notify {
                summary.notifications += 1;
                let kind_label = match decision.kind {
                    NotificationKind::Critical => "crítica",
                    NotificationKind::Normalized => "normalização",
                    NotificationKind::None => "nenhuma",
                };
                self.log.warn(
                    &station.station_id,
                    &format!(
                        "Notificação {} disparada: {} -> {}",
                        kind_label, old_status, new_status
                    ),
                );
                self.dispatch.dispatch(TransitionEvent {
                    station_id: station.station_id.clone(),
                    station_name: station.name.clone(),
                    old_status,
                    new_status,
                    kind: decision.kind,
                });
            }
        }

        if let Err(e) = self.export_snapshot() {
            self.log
                .error(SCOPE_GERAL, &format!("Falha ao exportar snapshot: {}", e));
        }

        self.log.info(
            SCOPE_GERAL,
            &format!(
                "Ciclo completo: {} novas, {} duplicadas, {} estações, {} notificações",
                summary.readings_inserted,
                summary.readings_duplicate,
                summary.stations_evaluated,
                summary.notifications
            ),
        );

        summary
    }

    /// Writes the `station_id -> status` snapshot consumed by the
    /// dashboard. Temp file plus rename, so readers never observe a
    /// half-written file.
    fn export_snapshot(&self) -> Result<(), Box<dyn Error>> {
        let path = match &self.config.status_snapshot_path {
            Some(path) => path,
            None => return Ok(()),
        };

        #[derive(serde::Serialize)]
        struct SnapshotEntry<'a> {
            label: String,
            risk: i32,
            as_of: &'a DateTime<Utc>,
        }

        let snapshot: std::collections::BTreeMap<&str, SnapshotEntry> = self
            .statuses
            .values()
            .map(|s| {
                (
                    s.station_id.as_str(),
                    SnapshotEntry {
                        label: s.status.to_string(),
                        risk: s.risk_level,
                        as_of: &s.as_of,
                    },
                )
            })
            .collect();

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loop
    // -----------------------------------------------------------------------

    /// Main daemon loop (runs indefinitely). Self-correcting period: the
    /// sleep shrinks by however long the cycle took, and an overrunning
    /// cycle starts the next one immediately with a warning.
    pub fn run(&mut self) -> ! {
        let period = std::time::Duration::from_secs(self.config.cycle_interval_secs);

        loop {
            let started = std::time::Instant::now();
            let now = Utc::now();

            let outcome = catch_unwind(AssertUnwindSafe(|| self.run_cycle(now)));
            if let Err(panic) = outcome {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic sem mensagem".to_string());
                self.log
                    .error(SCOPE_GERAL, &format!("Ciclo abortou com panic: {}", message));
            }

            let elapsed = started.elapsed();
            let sleep = sleep_duration(period, elapsed);
            if sleep.is_zero() {
                self.log.warn(
                    SCOPE_GERAL,
                    &format!(
                        "Ciclo excedeu o período ({}s > {}s); próximo ciclo imediato",
                        elapsed.as_secs(),
                        period.as_secs()
                    ),
                );
            } else {
                std::thread::sleep(sleep);
            }
        }
    }
}

/// Remaining sleep after a cycle: `max(0, period - elapsed)`. Never
/// negative, so an overrunning cycle rolls straight into the next one.
pub fn sleep_duration(
    period: std::time::Duration,
    elapsed: std::time::Duration,
) -> std::time::Duration {
    period.saturating_sub(elapsed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
