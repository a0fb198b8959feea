/// geomon_service: geotechnical slope monitoring service.
///
/// # Module structure
///
/// ```text
/// geomon_service
/// ├── model       — shared data types (Reading, Status, StationStatus, …)
/// ├── config      — station registry configuration loader (stations.toml)
/// ├── db          — embedded time-series store (readings, statuses, events)
/// ├── logging     — event log with station/GERAL scoping
/// ├── ingest
/// │   ├── collector — Collector trait, freshness filter, deterministic merge
/// │   └── fixtures  — synthetic reading streams for tests
/// ├── analysis
/// │   └── rolling   — time-windowed rolling sums over irregular series
/// ├── alert
/// │   ├── rainfall    — rainfall accumulation threshold bands
/// │   ├── moisture    — hierarchical soil-moisture trigger table
/// │   └── transitions — which status changes warrant notification
/// ├── notify      — notification dispatch worker (email/SMS gateway)
/// └── daemon      — main cycle loop (fetch, compute, persist, notify, sleep)
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod config;
pub mod daemon;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod notify;
