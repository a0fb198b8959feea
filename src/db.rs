/// Embedded time-series store for station readings, statuses, and events.
///
/// One SQLite file in WAL mode holds the whole persistent state of the
/// service: the rolling reading history, the last known status per
/// station, and the durable event log. The `Store` handle is constructed
/// explicitly at startup and passed to every component that needs it;
/// there is no process-wide connection singleton.
///
/// Durability: WAL journaling with synchronous=NORMAL. A crash can lose
/// the last unflushed transaction but never corrupts the file. The
/// service performs roughly one write transaction per 15-minute cycle,
/// so this tradeoff favors durability comfortably.
///
/// Concurrency: all writes serialize on the store's internal lock
/// (single-writer discipline). External readers of the same file are
/// never blocked by the append path beyond WAL isolation.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::env;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::logging::EventRecord;
use crate::model::{Reading, StationStatus, Status};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Storage errors. Only `OpenFailed` at boot is treated as fatal by the
/// daemon; everything else is logged and the cycle continues.
#[derive(Debug)]
pub enum StoreError {
    /// The database file could not be opened or initialized.
    OpenFailed { path: String, message: String },
    /// Any SQL-level failure after open.
    Sqlite(rusqlite::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::OpenFailed { path, message } => {
                write!(f, "Failed to open store at {}.\n\n", path)?;
                write!(f, "  Error: {}\n\n", message)?;
                write!(f, "  Common causes:\n")?;
                write!(f, "  - Parent directory does not exist or is not writable\n")?;
                write!(f, "  - GEOMON_DB points at a file the service cannot create\n")?;
                write!(f, "  - The file is not a SQLite database")
            }
            StoreError::Sqlite(e) => write!(f, "Store query failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

/// Result of one append batch. Duplicate `(station_id, timestamp)` pairs
/// are an expected condition, counted rather than raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Filter for reading queries. `last_hours` overrides `start` by
/// computing `now - last_hours`. `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub station_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub last_hours: Option<i64>,
}

/// Handle to the embedded store. Cheap to clone; all clones share one
/// serialized connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if necessary) the store at the given path and
    /// applies the schema idempotently.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::initialize(conn, &path.display().to_string())
    }

    /// Opens the store at the path named by the `GEOMON_DB` environment
    /// variable (loaded from .env if present), defaulting to `geomon.db`
    /// in the working directory.
    pub fn open_default() -> Result<Self, StoreError> {
        dotenv::dotenv().ok();
        let path = env::var("GEOMON_DB").unwrap_or_else(|_| "geomon.db".to_string());
        Self::open(Path::new(&path))
    }

    /// In-memory store for tests. Same schema, no file.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Self::initialize(conn, ":memory:")
    }

    fn initialize(conn: Connection, path: &str) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS readings (
                station_id        TEXT NOT NULL,
                ts                INTEGER NOT NULL,  -- unix seconds, UTC
                rainfall_mm       REAL,
                rainfall_accum_mm REAL,
                moisture_1m_pct   REAL,
                moisture_2m_pct   REAL,
                moisture_3m_pct   REAL,
                baseline_1m       REAL NOT NULL,
                baseline_2m       REAL NOT NULL,
                baseline_3m       REAL NOT NULL,
                PRIMARY KEY (station_id, ts)
            );

            CREATE INDEX IF NOT EXISTS idx_readings_ts ON readings(ts);

            CREATE TABLE IF NOT EXISTS station_status (
                station_id TEXT PRIMARY KEY,
                status     TEXT NOT NULL,
                risk_level INTEGER NOT NULL,
                as_of      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                ts      INTEGER NOT NULL,
                level   TEXT NOT NULL,
                scope   TEXT NOT NULL,
                message TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_scope ON events(scope);
            "#,
        )
        .map_err(|e| StoreError::OpenFailed {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // -----------------------------------------------------------------------
    // Readings
    // -----------------------------------------------------------------------

    /// Appends a batch of readings in one transaction. Readings whose
    /// `(station_id, timestamp)` already exists are skipped via
    /// `INSERT OR IGNORE` and counted as duplicates.
    pub fn append(&self, readings: &[Reading]) -> Result<AppendOutcome, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO readings
                 (station_id, ts, rainfall_mm, rainfall_accum_mm,
                  moisture_1m_pct, moisture_2m_pct, moisture_3m_pct,
                  baseline_1m, baseline_2m, baseline_3m)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for reading in readings {
                inserted += stmt.execute(params![
                    reading.station_id,
                    reading.timestamp.timestamp(),
                    reading.rainfall_mm,
                    reading.rainfall_accum_mm,
                    reading.moisture_1m_pct,
                    reading.moisture_2m_pct,
                    reading.moisture_3m_pct,
                    reading.baseline_1m,
                    reading.baseline_2m,
                    reading.baseline_3m,
                ])?;
            }
        }

        tx.commit()?;

        Ok(AppendOutcome {
            inserted,
            duplicates: readings.len() - inserted,
        })
    }

    /// Queries readings matching the filter, ascending by timestamp.
    pub fn query(&self, filter: &ReadingQuery) -> Result<Vec<Reading>, StoreError> {
        self.query_at(filter, Utc::now())
    }

    /// Same as `query` but with an explicit "now" for the `last_hours`
    /// computation, so windowed behavior is testable deterministically.
    pub fn query_at(
        &self,
        filter: &ReadingQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut sql = String::from(
            "SELECT station_id, ts, rainfall_mm, rainfall_accum_mm,
                    moisture_1m_pct, moisture_2m_pct, moisture_3m_pct,
                    baseline_1m, baseline_2m, baseline_3m
             FROM readings WHERE 1=1",
        );
        let mut args: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(ref station_id) = filter.station_id {
            sql.push_str(&format!(" AND station_id = ?{}", args.len() + 1));
            args.push(station_id.clone().into());
        }

        let start = match filter.last_hours {
            Some(hours) => Some(now - chrono::Duration::hours(hours)),
            None => filter.start,
        };

        if let Some(start) = start {
            sql.push_str(&format!(" AND ts >= ?{}", args.len() + 1));
            args.push(start.timestamp().into());
        }

        if let Some(end) = filter.end {
            sql.push_str(&format!(" AND ts < ?{}", args.len() + 1));
            args.push(end.timestamp().into());
        }

        sql.push_str(" ORDER BY ts ASC");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_reading)?;

        let mut readings = Vec::new();
        for row in rows {
            readings.push(row?);
        }
        Ok(readings)
    }

    /// Removes the listed points. Maintenance tooling only; the cycle
    /// path never deletes.
    pub fn delete(&self, timestamps: &[DateTime<Utc>]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM readings WHERE ts = ?1")?;
            for ts in timestamps {
                deleted += stmt.execute(params![ts.timestamp()])?;
            }
        }

        tx.commit()?;
        Ok(deleted)
    }

    /// Deletes readings older than the retention horizon. Used by the
    /// prune_history maintenance tool.
    pub fn prune_older_than(
        &self,
        hours: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let cutoff = (now - chrono::Duration::hours(hours)).timestamp();
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM readings WHERE ts < ?1", params![cutoff])?;
        Ok(deleted)
    }

    /// Total number of stored readings.
    pub fn reading_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM readings", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    // -----------------------------------------------------------------------
    // Station status
    // -----------------------------------------------------------------------

    /// Overwrites the persisted status row for one station.
    pub fn save_status(&self, status: &StationStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO station_status (station_id, status, risk_level, as_of)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (station_id) DO UPDATE SET
                status = excluded.status,
                risk_level = excluded.risk_level,
                as_of = excluded.as_of",
            params![
                status.station_id,
                status.status.to_string(),
                status.risk_level,
                status.as_of.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Loads all persisted station statuses, keyed by station id.
    /// Labels that fail to parse (from a pre-enum deployment) load as
    /// SEM DADOS so the next cycle re-derives them from data.
    pub fn load_statuses(
        &self,
    ) -> Result<std::collections::HashMap<String, StationStatus>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT station_id, status, as_of FROM station_status")?;

        let rows = stmt.query_map([], |row| {
            let station_id: String = row.get(0)?;
            let label: String = row.get(1)?;
            let as_of: i64 = row.get(2)?;
            Ok((station_id, label, as_of))
        })?;

        let mut statuses = std::collections::HashMap::new();
        for row in rows {
            let (station_id, label, as_of) = row?;
            let status = Status::parse_label(&label).unwrap_or(Status::SemDados);
            let as_of = Utc
                .timestamp_opt(as_of, 0)
                .single()
                .unwrap_or_else(Utc::now);
            statuses.insert(
                station_id.clone(),
                StationStatus::new(&station_id, status, as_of),
            );
        }
        Ok(statuses)
    }

    // -----------------------------------------------------------------------
    // Event log
    // -----------------------------------------------------------------------

    /// Appends one event row. Called by the event log, not directly.
    pub fn append_event(
        &self,
        ts: DateTime<Utc>,
        level: &str,
        scope: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (ts, level, scope, message) VALUES (?1, ?2, ?3, ?4)",
            params![ts.timestamp(), level, scope, message],
        )?;
        Ok(())
    }

    /// Queries events, newest last, optionally filtered to one scope
    /// (a station id, or "GERAL" for service-wide events).
    pub fn query_events(&self, scope: Option<&str>) -> Result<Vec<EventRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (sql, args): (&str, Vec<rusqlite::types::Value>) = match scope {
            Some(scope) => (
                "SELECT ts, level, scope, message FROM events
                 WHERE scope = ?1 ORDER BY id ASC",
                vec![scope.to_string().into()],
            ),
            None => (
                "SELECT ts, level, scope, message FROM events ORDER BY id ASC",
                vec![],
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
            let ts: i64 = row.get(0)?;
            Ok(EventRecord {
                timestamp: Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now),
                level: row.get(1)?,
                scope: row.get(2)?,
                message: row.get(3)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

fn row_to_reading(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reading> {
    let ts: i64 = row.get(1)?;
    Ok(Reading {
        station_id: row.get(0)?,
        timestamp: Utc
            .timestamp_opt(ts, 0)
            .single()
            .unwrap_or_else(Utc::now),
        rainfall_mm: row.get(2)?,
        rainfall_accum_mm: row.get(3)?,
        moisture_1m_pct: row.get(4)?,
        moisture_2m_pct: row.get(5)?,
        moisture_3m_pct: row.get(6)?,
        baseline_1m: row.get(7)?,
        baseline_2m: row.get(8)?,
        baseline_3m: row.get(9)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures;

    fn sample_reading(station: &str, ts: DateTime<Utc>, rain: Option<f64>) -> Reading {
        Reading {
            station_id: station.to_string(),
            timestamp: ts,
            rainfall_mm: rain,
            rainfall_accum_mm: None,
            moisture_1m_pct: Some(22.0),
            moisture_2m_pct: Some(25.0),
            moisture_3m_pct: Some(28.0),
            baseline_1m: 20.0,
            baseline_2m: 24.0,
            baseline_3m: 27.0,
        }
    }

    #[test]
    fn test_append_inserts_and_counts() {
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();

        let readings = vec![
            sample_reading("EST-01", t0, Some(1.0)),
            sample_reading("EST-01", t0 + chrono::Duration::minutes(15), Some(0.5)),
            sample_reading("EST-02", t0, None),
        ];

        let outcome = store.append(&readings).expect("append should succeed");
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.duplicates, 0);
        assert_eq!(store.reading_count().unwrap(), 3);
    }

    #[test]
    fn test_duplicate_append_is_a_noop() {
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();
        let reading = sample_reading("EST-01", t0, Some(2.5));

        store.append(&[reading.clone()]).expect("first append");
        let outcome = store.append(&[reading]).expect("second append");

        assert_eq!(outcome.inserted, 0, "duplicate must not insert");
        assert_eq!(outcome.duplicates, 1, "duplicate must be counted");
        assert_eq!(store.reading_count().unwrap(), 1, "row count unchanged");
    }

    #[test]
    fn test_duplicate_does_not_overwrite_first_write() {
        // Last-write-wins is explicitly rejected: the first stored value
        // survives a conflicting re-append.
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();

        store
            .append(&[sample_reading("EST-01", t0, Some(5.0))])
            .expect("first append");
        store
            .append(&[sample_reading("EST-01", t0, Some(99.0))])
            .expect("conflicting append");

        let rows = store
            .query(&ReadingQuery {
                station_id: Some("EST-01".to_string()),
                ..Default::default()
            })
            .expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rainfall_mm, Some(5.0));
    }

    #[test]
    fn test_query_range_inclusive_start_exclusive_end() {
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();
        let step = chrono::Duration::minutes(15);

        let readings: Vec<Reading> = (0..4)
            .map(|i| sample_reading("EST-01", t0 + step * i, Some(1.0)))
            .collect();
        store.append(&readings).expect("append");

        let rows = store
            .query(&ReadingQuery {
                station_id: Some("EST-01".to_string()),
                start: Some(t0 + step),
                end: Some(t0 + step * 3),
                ..Default::default()
            })
            .expect("query");

        assert_eq!(rows.len(), 2, "start inclusive, end exclusive");
        assert_eq!(rows[0].timestamp, t0 + step);
        assert_eq!(rows[1].timestamp, t0 + step * 2);
    }

    #[test]
    fn test_query_last_hours_overrides_start() {
        let store = Store::open_in_memory().expect("in-memory store");
        let now = fixtures::base_time();

        store
            .append(&[
                sample_reading("EST-01", now - chrono::Duration::hours(80), Some(1.0)),
                sample_reading("EST-01", now - chrono::Duration::hours(10), Some(2.0)),
            ])
            .expect("append");

        let rows = store
            .query_at(
                &ReadingQuery {
                    station_id: Some("EST-01".to_string()),
                    // start would include everything; last_hours must win
                    start: Some(now - chrono::Duration::hours(200)),
                    last_hours: Some(72),
                    ..Default::default()
                },
                now,
            )
            .expect("query");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rainfall_mm, Some(2.0));
    }

    #[test]
    fn test_query_ascending_order() {
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();

        // Insert out of order; query must come back ascending.
        store
            .append(&[
                sample_reading("EST-01", t0 + chrono::Duration::hours(2), Some(1.0)),
                sample_reading("EST-01", t0, Some(2.0)),
                sample_reading("EST-01", t0 + chrono::Duration::hours(1), Some(3.0)),
            ])
            .expect("append");

        let rows = store.query(&ReadingQuery::default()).expect("query");
        let times: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_delete_removes_listed_points() {
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();
        let t1 = t0 + chrono::Duration::minutes(15);

        store
            .append(&[
                sample_reading("EST-01", t0, Some(1.0)),
                sample_reading("EST-01", t1, Some(2.0)),
            ])
            .expect("append");

        let deleted = store.delete(&[t0]).expect("delete");
        assert_eq!(deleted, 1);
        assert_eq!(store.reading_count().unwrap(), 1);
    }

    #[test]
    fn test_prune_older_than_retention() {
        let store = Store::open_in_memory().expect("in-memory store");
        let now = fixtures::base_time();

        store
            .append(&[
                sample_reading("EST-01", now - chrono::Duration::hours(100), Some(1.0)),
                sample_reading("EST-01", now - chrono::Duration::hours(10), Some(2.0)),
            ])
            .expect("append");

        let pruned = store.prune_older_than(72, now).expect("prune");
        assert_eq!(pruned, 1);
        assert_eq!(store.reading_count().unwrap(), 1);
    }

    #[test]
    fn test_status_round_trip() {
        let store = Store::open_in_memory().expect("in-memory store");
        let as_of = fixtures::base_time();

        store
            .save_status(&StationStatus::new("EST-01", Status::Alerta, as_of))
            .expect("save");
        store
            .save_status(&StationStatus::new("EST-01", Status::Paralizacao, as_of))
            .expect("overwrite");

        let statuses = store.load_statuses().expect("load");
        assert_eq!(statuses.len(), 1);
        let st = &statuses["EST-01"];
        assert_eq!(st.status, Status::Paralizacao);
        assert_eq!(st.risk_level, 3);
        assert_eq!(st.as_of, as_of);
    }

    #[test]
    fn test_event_scope_filtering() {
        let store = Store::open_in_memory().expect("in-memory store");
        let ts = fixtures::base_time();

        store
            .append_event(ts, "INFO", "GERAL", "cycle complete")
            .expect("append event");
        store
            .append_event(ts, "WARN", "EST-01", "status changed")
            .expect("append event");

        let all = store.query_events(None).expect("query all");
        assert_eq!(all.len(), 2);

        let station = store.query_events(Some("EST-01")).expect("query station");
        assert_eq!(station.len(), 1);
        assert_eq!(station[0].message, "status changed");

        let geral = store.query_events(Some("GERAL")).expect("query geral");
        assert_eq!(geral.len(), 1);
        assert_eq!(geral[0].level, "INFO");
    }

    #[test]
    fn test_concurrent_appends_serialize() {
        let store = Store::open_in_memory().expect("in-memory store");
        let t0 = fixtures::base_time();

        let mut handles = Vec::new();
        for writer in 0..2 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                let readings: Vec<Reading> = (0..50)
                    .map(|i| Reading {
                        station_id: format!("EST-{:02}", writer),
                        timestamp: t0 + chrono::Duration::minutes(i * 15),
                        rainfall_mm: Some(1.0),
                        rainfall_accum_mm: None,
                        moisture_1m_pct: None,
                        moisture_2m_pct: None,
                        moisture_3m_pct: None,
                        baseline_1m: 20.0,
                        baseline_2m: 24.0,
                        baseline_3m: 27.0,
                    })
                    .collect();
                store.append(&readings).expect("append under contention")
            }));
        }

        for handle in handles {
            let outcome = handle.join().expect("writer thread");
            assert_eq!(outcome.inserted, 50);
        }
        assert_eq!(store.reading_count().unwrap(), 100);
    }
}
