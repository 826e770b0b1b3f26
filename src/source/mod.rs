//! Reading sources.
//!
//! Two strategies behind one interface: `LocalDeterministic` computes
//! readings from sensor parameters (pure, reproducible), `RemoteBacked`
//! fetches them from an upstream HTTP source. The dashboard store and the
//! history endpoint only ever see `ReadingSource`.

pub mod synth;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{Config, SourceMode};
use crate::error::AppResult;
use crate::registry::Sensor;
use upstream::UpstreamClient;

/// One temperature/humidity sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    /// `HH:MM` label for the sample.
    pub time: String,
    /// Degrees Celsius, one decimal.
    pub temperature: f64,
    /// Relative humidity, clamped to [30, 70].
    pub humidity: f64,
    /// Whether this sample exceeds the alarm threshold.
    #[serde(default)]
    pub alert: bool,
}

/// Cache for remote historical series. A (sensor, date) range is bounded,
/// so entries only ever expire by TTL.
pub type SeriesCache = Cache<String, Arc<Vec<Reading>>>;

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:` separator. Empty components are included
/// to ensure different queries produce different keys.
#[must_use]
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

pub enum ReadingSource {
    /// Pure function of (date, sensor). No I/O.
    LocalDeterministic,
    /// Upstream HTTP source with a TTL cache over historical responses.
    RemoteBacked {
        client: UpstreamClient,
        cache: SeriesCache,
    },
}

impl ReadingSource {
    /// Build the source selected by configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match config.source_mode {
            SourceMode::Mock => Self::LocalDeterministic,
            SourceMode::Remote => Self::RemoteBacked {
                client: UpstreamClient::new(config),
                cache: Cache::builder()
                    .max_capacity(config.cache_max_entries)
                    .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
                    .build(),
            },
        }
    }

    /// 24-hour historical series for a sensor and date.
    ///
    /// Deterministic mode is a pure computation; remote mode consults the
    /// series cache before going upstream. An empty upstream response is an
    /// empty series, not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnreachable` when the upstream request
    /// fails in remote mode.
    pub async fn historical_series(
        &self,
        sensor: &Sensor,
        date: NaiveDate,
        alarm_threshold: f64,
    ) -> AppResult<Vec<Reading>> {
        match self {
            Self::LocalDeterministic => {
                Ok(synth::historical_series(date, sensor, alarm_threshold))
            }
            Self::RemoteBacked { client, cache } => {
                let key = cache_key(
                    "history",
                    &[&sensor.id, &date.format("%Y-%m-%d").to_string()],
                );
                if let Some(cached) = cache.get(&key).await {
                    tracing::debug!(key = %key, "Serving historical series from cache");
                    return Ok((*cached).clone());
                }

                let mut series = client.get_historical(&sensor.id, date).await?;
                for reading in &mut series {
                    reading.alert = reading.temperature > alarm_threshold;
                }
                cache.insert(key, Arc::new(series.clone())).await;
                Ok(series)
            }
        }
    }

    /// Latest reading for a sensor. Jittered in deterministic mode,
    /// fetched in remote mode.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnreachable` when the upstream request
    /// fails in remote mode.
    pub async fn current_reading(
        &self,
        sensor: &Sensor,
        alarm_threshold: f64,
    ) -> AppResult<Reading> {
        match self {
            Self::LocalDeterministic => Ok(synth::current_reading(sensor, alarm_threshold)),
            Self::RemoteBacked { client, .. } => {
                let mut reading = client.get_current(&sensor.id).await?;
                reading.alert = reading.temperature > alarm_threshold;
                Ok(reading)
            }
        }
    }
}
