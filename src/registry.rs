//! Sensor registry: the inventory of known sensors and their generator
//! parameters.
//!
//! One canonical schema covers every source the fleet has used over time:
//! the camelCase spellings of the original deployment (`baseTemp`,
//! `tempMultiplier`) and the device-prefixed identity records some
//! upstreams return (`deviceId`/`deviceName`) are accepted as serde
//! aliases. Identity-only records get neutral generator defaults.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{Config, ConfigError};
use crate::error::{AppError, AppResult};
use crate::source::upstream::UpstreamClient;

fn default_base_temperature() -> f64 {
    22.0
}

fn default_base_humidity() -> f64 {
    50.0
}

fn default_variability() -> f64 {
    1.0
}

/// A registered sensor. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    #[serde(alias = "deviceId")]
    pub id: String,
    #[serde(alias = "name", alias = "deviceName")]
    pub display_name: String,
    #[serde(alias = "baseTemp", default = "default_base_temperature")]
    pub base_temperature: f64,
    #[serde(alias = "baseHumidity", default = "default_base_humidity")]
    pub base_humidity: f64,
    #[serde(alias = "tempMultiplier", default = "default_variability")]
    pub temperature_variability: f64,
    #[serde(alias = "humidityMultiplier", default = "default_variability")]
    pub humidity_variability: f64,
}

/// Bundled defaults, mirroring the shipped `sensors.json` of the original
/// deployment. Used when no sensors file and no upstream are configured.
fn bundled_sensors() -> Vec<Sensor> {
    vec![
        Sensor {
            id: "sensor-1".to_string(),
            display_name: "Garden Sensor".to_string(),
            base_temperature: 22.0,
            base_humidity: 50.0,
            temperature_variability: 1.0,
            humidity_variability: 1.0,
        },
        Sensor {
            id: "sensor-2".to_string(),
            display_name: "Greenhouse Sensor".to_string(),
            base_temperature: 26.0,
            base_humidity: 60.0,
            temperature_variability: 1.5,
            humidity_variability: 1.2,
        },
        Sensor {
            id: "sensor-3".to_string(),
            display_name: "Basement Sensor".to_string(),
            base_temperature: 18.0,
            base_humidity: 55.0,
            temperature_variability: 0.5,
            humidity_variability: 0.8,
        },
    ]
}

/// Registry of known sensors.
///
/// Holds the last-known-good sensor list behind an `RwLock`: a failed
/// upstream refresh keeps serving the previous inventory rather than
/// tearing the dashboard down.
pub struct SensorRegistry {
    sensors: RwLock<Vec<Sensor>>,
}

impl SensorRegistry {
    /// Build the registry from configuration: `SENSORS_FILE` if set,
    /// otherwise the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::SensorsFile` if a configured sensors file
    /// cannot be read or parsed (fail-fast at startup).
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let sensors = match &config.sensors_file {
            Some(path) => {
                let raw =
                    std::fs::read_to_string(path).map_err(|e| ConfigError::SensorsFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                serde_json::from_str::<Vec<Sensor>>(&raw).map_err(|e| {
                    ConfigError::SensorsFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?
            }
            None => bundled_sensors(),
        };

        tracing::info!(count = sensors.len(), "Sensor registry loaded");
        Ok(Self {
            sensors: RwLock::new(sensors),
        })
    }

    /// List all known sensors.
    #[must_use]
    pub fn list(&self) -> Vec<Sensor> {
        self.sensors
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Look up a sensor by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Sensor> {
        self.sensors
            .read()
            .ok()
            .and_then(|guard| guard.iter().find(|s| s.id == id).cloned())
    }

    /// Refresh the inventory from the upstream sensor list.
    ///
    /// On success the new list replaces the old wholesale. On failure the
    /// last-known-good list is kept and returned if non-empty; with nothing
    /// cached the error surfaces as `DataUnavailable` (recoverable, the
    /// caller offers a retry).
    ///
    /// # Errors
    ///
    /// Returns `AppError::DataUnavailable` when the upstream is unreachable
    /// and no previous inventory exists.
    pub async fn refresh_from_upstream(&self, client: &UpstreamClient) -> AppResult<Vec<Sensor>> {
        match client.get_sensors().await {
            Ok(sensors) => {
                tracing::debug!(count = sensors.len(), "Sensor inventory refreshed");
                if let Ok(mut guard) = self.sensors.write() {
                    *guard = sensors.clone();
                }
                Ok(sensors)
            }
            Err(e) => {
                let cached = self.list();
                if cached.is_empty() {
                    Err(AppError::DataUnavailable(format!(
                        "Sensor list unavailable: {e}"
                    )))
                } else {
                    tracing::warn!(error = %e, "Sensor refresh failed, serving last-known-good list");
                    Ok(cached)
                }
            }
        }
    }
}
