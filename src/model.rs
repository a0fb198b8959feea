/// Core data types for the geotechnical slope monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O — only types, the status/risk mapping, and the
/// error enums used across layer boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// A single telemetry sample for one station at one instant.
///
/// Baselines are carried per-reading so historical recomputation uses the
/// calibration that was valid at capture time, not whatever is configured
/// today. The pair `(station_id, timestamp)` is unique in the store; a
/// second write for the same pair is dropped, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station_id: String,
    /// UTC instant, second precision.
    pub timestamp: DateTime<Utc>,
    /// Interval rainfall reported by the station, in millimeters.
    pub rainfall_mm: Option<f64>,
    /// Vendor-reported cumulative-since-reset rainfall. Resets discontinuously;
    /// kept for audit, never used for windowed accumulation.
    pub rainfall_accum_mm: Option<f64>,
    pub moisture_1m_pct: Option<f64>,
    pub moisture_2m_pct: Option<f64>,
    pub moisture_3m_pct: Option<f64>,
    pub baseline_1m: f64,
    pub baseline_2m: f64,
    pub baseline_3m: f64,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Discrete risk classification for a station, ordered by severity.
///
/// The integer risk level backing each label is a fixed contract with the
/// dashboard and must not change:
///
/// | risk | label        |
/// |------|--------------|
/// | -1   | SEM DADOS    |
/// |  0   | LIVRE        |
/// |  1   | ATENÇÃO      |
/// |  2   | ALERTA       |
/// |  3   | PARALIZAÇÃO  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    SemDados,
    Livre,
    Atencao,
    Alerta,
    Paralizacao,
}

impl Status {
    /// Fixed risk-level mapping backing the display label.
    pub fn risk_level(&self) -> i32 {
        match self {
            Status::SemDados => -1,
            Status::Livre => 0,
            Status::Atencao => 1,
            Status::Alerta => 2,
            Status::Paralizacao => 3,
        }
    }

    /// Parses a persisted label. Accepts the legacy aliases `INDEFINIDO`
    /// and `ERRO`, which older deployments wrote for the no-data state.
    pub fn parse_label(label: &str) -> Option<Status> {
        match label {
            "SEM DADOS" | "INDEFINIDO" | "ERRO" => Some(Status::SemDados),
            "LIVRE" => Some(Status::Livre),
            "ATENÇÃO" => Some(Status::Atencao),
            "ALERTA" => Some(Status::Alerta),
            "PARALIZAÇÃO" => Some(Status::Paralizacao),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::SemDados => write!(f, "SEM DADOS"),
            Status::Livre => write!(f, "LIVRE"),
            Status::Atencao => write!(f, "ATENÇÃO"),
            Status::Alerta => write!(f, "ALERTA"),
            Status::Paralizacao => write!(f, "PARALIZAÇÃO"),
        }
    }
}

/// Last known classification for one station, persisted between cycles.
///
/// One row per configured station, overwritten every cycle. This is the
/// single source of truth the transition detector diffs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatus {
    pub station_id: String,
    pub status: Status,
    pub risk_level: i32,
    pub as_of: DateTime<Utc>,
}

impl StationStatus {
    pub fn new(station_id: &str, status: Status, as_of: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.to_string(),
            status,
            risk_level: status.risk_level(),
            as_of,
        }
    }
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Rainfall accumulation bands, in millimeters over the rolling window.
///
/// Bands are strict lower-exclusive / upper-inclusive:
///   value <= verde          → LIVRE
///   verde < value <= amarelo → ATENÇÃO
///   amarelo < value <= laranja → ALERTA
///   value > laranja          → PARALIZAÇÃO
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RainfallThresholds {
    pub verde_mm: f64,
    pub amarelo_mm: f64,
    pub laranja_mm: f64,
}

impl RainfallThresholds {
    /// Builds a threshold set, rejecting bands that are not strictly ascending.
    pub fn new(verde_mm: f64, amarelo_mm: f64, laranja_mm: f64) -> Result<Self, ConfigError> {
        if !(verde_mm < amarelo_mm && amarelo_mm < laranja_mm) {
            return Err(ConfigError::InvalidThresholds {
                verde_mm,
                amarelo_mm,
                laranja_mm,
            });
        }
        Ok(Self {
            verde_mm,
            amarelo_mm,
            laranja_mm,
        })
    }
}

impl Default for RainfallThresholds {
    fn default() -> Self {
        Self {
            verde_mm: 50.0,
            amarelo_mm: 69.0,
            laranja_mm: 89.0,
        }
    }
}

/// Default moisture trigger delta, in percentage points above baseline.
pub const DEFAULT_MOISTURE_DELTA: f64 = 3.0;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised when fetching readings from an upstream collector.
#[derive(Debug, PartialEq)]
pub enum CollectError {
    /// Non-2xx response or transport failure talking to the vendor source.
    Upstream(String),
    /// The payload could not be interpreted as readings.
    ParseError(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            CollectError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

/// Configuration validation errors, fatal at startup only.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Rainfall bands must be strictly ascending (verde < amarelo < laranja).
    InvalidThresholds {
        verde_mm: f64,
        amarelo_mm: f64,
        laranja_mm: f64,
    },
    /// stations.toml missing or unreadable.
    RegistryUnreadable(String),
    /// stations.toml present but malformed.
    RegistryMalformed(String),
    /// The registry parsed but contains no stations.
    EmptyRegistry,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidThresholds {
                verde_mm,
                amarelo_mm,
                laranja_mm,
            } => write!(
                f,
                "Rainfall thresholds must ascend: verde={} amarelo={} laranja={}",
                verde_mm, amarelo_mm, laranja_mm
            ),
            ConfigError::RegistryUnreadable(msg) => {
                write!(f, "Failed to read station registry: {}", msg)
            }
            ConfigError::RegistryMalformed(msg) => {
                write!(f, "Failed to parse station registry: {}", msg)
            }
            ConfigError::EmptyRegistry => write!(f, "Station registry contains no stations"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
