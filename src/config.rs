/// Station configuration loader - parses stations.toml
///
/// Separates station metadata from code, making it easy to adjust
/// baselines, rename stations, or add new monitoring points without
/// recompiling the service.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::model::ConfigError;

/// Station metadata loaded from the stations.toml configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub station_id: String,
    pub name: String,
    /// Free-text location description shown in notifications.
    pub location: String,

    // Default soil-moisture baselines, percentage at each sensor depth.
    // Snapshotted into every Reading at capture time.
    pub baseline_1m: f64,
    pub baseline_2m: f64,
    pub baseline_3m: f64,
}

/// Root configuration structure for TOML parsing.
#[derive(Debug, Deserialize)]
struct StationRegistry {
    station: Vec<StationConfig>,
}

/// Loads the station registry from `stations.toml` in the working
/// directory. The service cannot operate without valid station metadata,
/// so a missing or malformed registry is a startup error the caller
/// treats as fatal.
pub fn load_config() -> Result<Vec<StationConfig>, ConfigError> {
    load_config_from(Path::new("stations.toml"))
}

/// Loads the station registry from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Vec<StationConfig>, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::RegistryUnreadable(format!("{}: {}", path.display(), e)))?;

    let registry: StationRegistry = toml::from_str(&contents)
        .map_err(|e| ConfigError::RegistryMalformed(format!("{}: {}", path.display(), e)))?;

    if registry.station.is_empty() {
        return Err(ConfigError::EmptyRegistry);
    }

    Ok(registry.station)
}
