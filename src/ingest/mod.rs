/// Telemetry ingestion for the slope monitoring service.
///
/// Upstream vendor protocols are opaque here: each data source is an
/// injected `Collector` returning raw `Reading`s. This module owns what
/// happens between the collector and the store — freshness filtering and
/// the deterministic merge of parallel fetches.
///
/// Submodules:
/// - `collector` — the Collector trait, freshness filter, merge/sort.
/// - `file_drop` — spool-directory collector fed by out-of-process fetchers.
/// - `fixtures`  — deterministic synthetic reading streams for tests.

pub mod collector;
pub mod file_drop;
pub mod fixtures;
