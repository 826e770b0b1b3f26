//! Dashboard readings store.
//!
//! Single owner of the displayed state: current selection, load phase,
//! historical series, smoothed current readings, and the alarm flag. All
//! mutation funnels through here.
//!
//! Two guards keep async completions honest:
//!
//! - a selection **epoch** (atomic counter) tagged onto every load at issue
//!   time; a completion whose epoch no longer matches is discarded, so a
//!   result for a superseded sensor/date never overwrites newer state;
//! - an alarm **generation** tagged onto every activation; the one-shot
//!   auto-clear task only clears if its generation is still current, so a
//!   re-trigger extends the alarm and earlier timers become no-ops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use tokio::time::interval;
use utoipa::ToSchema;

use crate::common::AppState;
use crate::config::Config;
use crate::error::AppResult;
use crate::registry::Sensor;
use crate::source::{Reading, ReadingSource};

/// Exponential decay factor for the displayed current readings:
/// `displayed += (sampled - displayed) * 0.2` per refresh tick, so live
/// values glide instead of snapping.
pub const SMOOTHING_FACTOR: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Idle,
    Loading,
    Ready,
    Error,
}

/// The sensor/date pair the dashboard is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Selection {
    pub sensor_id: String,
    pub date: NaiveDate,
}

/// Alarm behavior knobs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct AlarmPolicy {
    /// Temperature above this activates the alarm.
    pub threshold_c: f64,
    /// How long an activation stays visible before auto-clearing.
    pub hold: Duration,
    /// Per-tick chance of a simulated trigger, 0 disables.
    pub trigger_probability: f64,
}

impl AlarmPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            threshold_c: config.alarm_threshold_c,
            hold: Duration::from_secs(config.alarm_hold_seconds),
            trigger_probability: config.alarm_trigger_probability,
        }
    }
}

/// Point-in-time view of the store, as served to the page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Snapshot {
    pub phase: LoadPhase,
    pub selection: Option<Selection>,
    pub error: Option<String>,
    /// Smoothed temperature, one decimal, absent until the first load.
    pub current_temperature: Option<f64>,
    /// Smoothed humidity, whole percent.
    pub current_humidity: Option<f64>,
    /// `HH:MM` stamp of the most recent raw sample.
    pub sampled_at: Option<String>,
    pub series: Vec<Reading>,
    pub alarm_active: bool,
}

struct Inner {
    selection: Option<Selection>,
    sensor: Option<Sensor>,
    phase: LoadPhase,
    error: Option<String>,
    series: Vec<Reading>,
    last_sample: Option<Reading>,
    displayed_temperature: Option<f64>,
    displayed_humidity: Option<f64>,
    alarm_active: bool,
}

impl Inner {
    fn initial() -> Self {
        Self {
            selection: None,
            sensor: None,
            phase: LoadPhase::Idle,
            error: None,
            series: Vec::new(),
            last_sample: None,
            displayed_temperature: None,
            displayed_humidity: None,
            alarm_active: false,
        }
    }
}

pub struct DashboardStore {
    source: Arc<ReadingSource>,
    alarm: AlarmPolicy,
    inner: RwLock<Inner>,
    epoch: AtomicU64,
    alarm_generation: AtomicU64,
}

fn smooth(displayed: f64, sampled: f64) -> f64 {
    displayed + (sampled - displayed) * SMOOTHING_FACTOR
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

impl DashboardStore {
    #[must_use]
    pub fn new(source: Arc<ReadingSource>, alarm: AlarmPolicy) -> Self {
        Self {
            source,
            alarm,
            inner: RwLock::new(Inner::initial()),
            epoch: AtomicU64::new(0),
            alarm_generation: AtomicU64::new(0),
        }
    }

    /// Current view of the store.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let Ok(inner) = self.inner.read() else {
            return Snapshot {
                phase: LoadPhase::Error,
                selection: None,
                error: Some("store poisoned".to_string()),
                current_temperature: None,
                current_humidity: None,
                sampled_at: None,
                series: Vec::new(),
                alarm_active: false,
            };
        };
        Snapshot {
            phase: inner.phase,
            selection: inner.selection.clone(),
            error: inner.error.clone(),
            current_temperature: inner.displayed_temperature.map(round1),
            current_humidity: inner.displayed_humidity.map(f64::round),
            sampled_at: inner.last_sample.as_ref().map(|s| s.time.clone()),
            series: inner.series.clone(),
            alarm_active: inner.alarm_active,
        }
    }

    /// Switch the dashboard to `(sensor, date)` and load it.
    ///
    /// Enters `Loading` immediately; the fetch runs as a spawned task
    /// whose completion is applied only if no newer selection has been
    /// made in the meantime. Also the retry path after an `Error`.
    pub fn select(self: &Arc<Self>, sensor: Sensor, date: NaiveDate) {
        let epoch = self.begin_load(sensor.clone(), date);

        let store = Arc::clone(self);
        tokio::spawn(async move {
            let result = store.load(&sensor, date).await;
            store.apply_loaded(epoch, result);
        });
    }

    /// Record the new selection, enter `Loading`, and return the epoch the
    /// in-flight load must present at completion.
    ///
    /// The epoch bump happens under the state lock so the recorded
    /// selection and the current epoch can never disagree.
    fn begin_load(&self, sensor: Sensor, date: NaiveDate) -> u64 {
        let Ok(mut inner) = self.inner.write() else {
            return self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        };
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        inner.selection = Some(Selection {
            sensor_id: sensor.id.clone(),
            date,
        });
        inner.sensor = Some(sensor);
        inner.phase = LoadPhase::Loading;
        inner.error = None;
        epoch
    }

    async fn load(&self, sensor: &Sensor, date: NaiveDate) -> AppResult<(Vec<Reading>, Reading)> {
        let series = self
            .source
            .historical_series(sensor, date, self.alarm.threshold_c)
            .await?;
        let current = self
            .source
            .current_reading(sensor, self.alarm.threshold_c)
            .await?;
        Ok((series, current))
    }

    /// Apply a completed load, unless a newer selection superseded it.
    fn apply_loaded(self: &Arc<Self>, epoch: u64, result: AppResult<(Vec<Reading>, Reading)>) {
        let mut trigger = false;
        {
            let Ok(mut inner) = self.inner.write() else {
                return;
            };
            // Staleness guard: compare under the same lock that applies
            // the result, so a concurrent select can't slip between.
            if epoch != self.epoch.load(Ordering::SeqCst) {
                tracing::debug!(epoch, "Discarding stale load result");
                return;
            }

            match result {
                Ok((series, current)) => {
                    inner.phase = LoadPhase::Ready;
                    inner.error = None;
                    inner.series = series;
                    // First sample after a load snaps; smoothing starts
                    // from the next refresh tick.
                    inner.displayed_temperature = Some(current.temperature);
                    inner.displayed_humidity = Some(current.humidity);
                    trigger = current.temperature > self.alarm.threshold_c;
                    inner.last_sample = Some(current);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Selection load failed");
                    inner.phase = LoadPhase::Error;
                    inner.error = Some(e.to_string());
                    inner.series = Vec::new();
                }
            }
        }
        if trigger {
            self.trigger_alarm();
        }
    }

    /// One pass of the periodic refresh: re-sample the current reading for
    /// the active selection and glide the displayed values toward it.
    ///
    /// Does nothing outside `Ready`. A failed sample is logged and
    /// swallowed; the displayed values and phase stay untouched and the
    /// next tick tries again.
    pub async fn refresh_tick(self: &Arc<Self>) {
        let (sensor, epoch) = {
            let Ok(inner) = self.inner.read() else {
                return;
            };
            if inner.phase != LoadPhase::Ready {
                return;
            }
            let Some(sensor) = inner.sensor.clone() else {
                return;
            };
            (sensor, self.epoch.load(Ordering::SeqCst))
        };

        match self
            .source
            .current_reading(&sensor, self.alarm.threshold_c)
            .await
        {
            Ok(sample) => self.apply_sample(epoch, sample),
            Err(e) => {
                tracing::debug!(error = %e, "Refresh sample failed, keeping displayed values");
            }
        }
    }

    /// Fold a fresh sample into the displayed values, unless the selection
    /// changed while sampling.
    fn apply_sample(self: &Arc<Self>, epoch: u64, sample: Reading) {
        let mut trigger = false;
        {
            let Ok(mut inner) = self.inner.write() else {
                return;
            };
            if epoch != self.epoch.load(Ordering::SeqCst) || inner.phase != LoadPhase::Ready {
                tracing::debug!(epoch, "Discarding stale refresh sample");
                return;
            }

            inner.displayed_temperature = Some(match inner.displayed_temperature {
                Some(displayed) => smooth(displayed, sample.temperature),
                None => sample.temperature,
            });
            inner.displayed_humidity = Some(match inner.displayed_humidity {
                Some(displayed) => smooth(displayed, sample.humidity),
                None => sample.humidity,
            });
            trigger = sample.temperature > self.alarm.threshold_c;
            inner.last_sample = Some(sample);
        }

        if !trigger && self.alarm.trigger_probability > 0.0 {
            trigger = rand::thread_rng().gen_bool(self.alarm.trigger_probability);
        }
        if trigger {
            self.trigger_alarm();
        }
    }

    /// Activate the alarm and arm its one-shot auto-clear.
    ///
    /// Each activation bumps the generation; the clear task only fires if
    /// its generation is still current (last-write-wins on the timer).
    fn trigger_alarm(self: &Arc<Self>) {
        let generation = self.alarm_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut inner) = self.inner.write() {
            if !inner.alarm_active {
                tracing::info!("Alarm activated");
            }
            inner.alarm_active = true;
        }

        let store = Arc::clone(self);
        let hold = self.alarm.hold;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            if store.alarm_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Ok(mut inner) = store.inner.write() {
                if inner.alarm_active {
                    tracing::info!("Alarm auto-cleared");
                    inner.alarm_active = false;
                }
            }
        });
    }
}

/// Periodic current-reading refresh, spawned from `main` and terminated
/// with the process. Reads the selection fresh on every tick, so a sensor
/// change never leaves a timer updating state nobody is watching.
pub async fn run_refresh_loop(state: AppState) {
    let interval_secs = state.config.refresh_interval_seconds;
    tracing::info!(interval_secs, "Starting current-reading refresh loop");

    let mut ticker = interval(Duration::from_secs(interval_secs));
    // The first tick completes immediately; the store is Idle until the
    // page posts a selection, so nothing to do yet.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        state.store.refresh_tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::source::synth;

    fn test_sensor(id: &str) -> Sensor {
        Sensor {
            id: id.to_string(),
            display_name: id.to_string(),
            base_temperature: 22.0,
            base_humidity: 50.0,
            temperature_variability: 1.0,
            humidity_variability: 1.0,
        }
    }

    fn test_store(hold_secs: u64) -> Arc<DashboardStore> {
        Arc::new(DashboardStore::new(
            Arc::new(ReadingSource::LocalDeterministic),
            AlarmPolicy {
                threshold_c: 20.0,
                hold: Duration::from_secs(hold_secs),
                trigger_probability: 0.0,
            },
        ))
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn reading(temperature: f64, humidity: f64) -> Reading {
        Reading {
            time: "12:00".to_string(),
            temperature,
            humidity,
            alert: false,
        }
    }

    #[test]
    fn smoothing_blends_one_fifth_of_the_gap() {
        assert!((smooth(20.0, 25.0) - 21.0).abs() < 1e-12);
        assert!((smooth(21.0, 25.0) - 21.8).abs() < 1e-12);
        // No gap, no movement
        assert_eq!(smooth(25.0, 25.0), 25.0);
    }

    #[tokio::test]
    async fn select_reaches_ready_with_full_series() {
        let store = test_store(5);
        store.select(test_sensor("a"), date("2024-01-15"));

        for _ in 0..100 {
            if store.snapshot().phase == LoadPhase::Ready {
                break;
            }
            tokio::task::yield_now().await;
        }

        let snap = store.snapshot();
        assert_eq!(snap.phase, LoadPhase::Ready);
        assert_eq!(snap.series.len(), synth::SERIES_LEN);
        assert!(snap.current_temperature.is_some());
        assert_eq!(snap.selection.unwrap().sensor_id, "a");
    }

    #[tokio::test]
    async fn stale_load_result_is_discarded() {
        let store = test_store(5);
        let d = date("2024-01-15");

        let epoch_a = store.begin_load(test_sensor("a"), d);
        let epoch_b = store.begin_load(test_sensor("b"), d);

        let series_a = synth::historical_series(d, &test_sensor("a"), 20.0);
        store.apply_loaded(epoch_a, Ok((series_a, reading(10.0, 40.0))));

        // A's completion arrived after B was selected: still Loading,
        // nothing from A visible.
        let snap = store.snapshot();
        assert_eq!(snap.phase, LoadPhase::Loading);
        assert!(snap.series.is_empty());
        assert_eq!(snap.selection.as_ref().unwrap().sensor_id, "b");

        let series_b = synth::historical_series(d, &test_sensor("b"), 20.0);
        store.apply_loaded(epoch_b, Ok((series_b.clone(), reading(11.0, 41.0))));

        let snap = store.snapshot();
        assert_eq!(snap.phase, LoadPhase::Ready);
        assert_eq!(snap.series, series_b);
        assert_eq!(snap.current_temperature, Some(11.0));
    }

    #[tokio::test]
    async fn failed_load_enters_error_and_retry_recovers() {
        let store = test_store(5);
        let d = date("2024-01-15");

        let epoch = store.begin_load(test_sensor("a"), d);
        store.apply_loaded(
            epoch,
            Err(AppError::SourceUnreachable("connection refused".to_string())),
        );

        let snap = store.snapshot();
        assert_eq!(snap.phase, LoadPhase::Error);
        assert!(snap.error.unwrap().contains("connection refused"));

        // Retry is just another selection
        let epoch = store.begin_load(test_sensor("a"), d);
        let series = synth::historical_series(d, &test_sensor("a"), 20.0);
        store.apply_loaded(epoch, Ok((series, reading(15.0, 50.0))));
        let snap = store.snapshot();
        assert_eq!(snap.phase, LoadPhase::Ready);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn refresh_sample_smooths_displayed_values() {
        let store = test_store(5);
        let d = date("2024-01-15");

        let epoch = store.begin_load(test_sensor("a"), d);
        let series = synth::historical_series(d, &test_sensor("a"), 20.0);
        store.apply_loaded(epoch, Ok((series, reading(20.0, 50.0))));

        store.apply_sample(epoch, reading(25.0, 60.0));
        let snap = store.snapshot();
        assert_eq!(snap.current_temperature, Some(21.0));
        assert_eq!(snap.current_humidity, Some(52.0));
        assert_eq!(snap.sampled_at.as_deref(), Some("12:00"));

        // A sample tagged with a superseded epoch changes nothing
        store.begin_load(test_sensor("b"), d);
        store.apply_sample(epoch, reading(0.0, 30.0));
        let snap = store.snapshot();
        assert_eq!(snap.current_temperature, Some(21.0));
    }

    #[tokio::test]
    async fn refresh_tick_outside_ready_is_a_noop() {
        let store = test_store(5);
        store.refresh_tick().await;
        let snap = store.snapshot();
        assert_eq!(snap.phase, LoadPhase::Idle);
        assert!(snap.current_temperature.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn alarm_auto_clears_after_hold() {
        let store = test_store(5);
        store.trigger_alarm();
        assert!(store.snapshot().alarm_active);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(store.snapshot().alarm_active);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!store.snapshot().alarm_active);
    }

    #[tokio::test(start_paused = true)]
    async fn alarm_retrigger_extends_via_last_write_wins() {
        let store = test_store(5);
        store.trigger_alarm();

        tokio::time::sleep(Duration::from_secs(3)).await;
        store.trigger_alarm();

        // t = 5.5s: the first timer has fired but its generation is stale
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(store.snapshot().alarm_active);

        // t = 8.5s: the second timer has cleared it
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!store.snapshot().alarm_active);
    }

    #[tokio::test]
    async fn hot_reading_on_load_raises_alarm() {
        let store = test_store(60);
        let d = date("2024-01-15");
        let epoch = store.begin_load(test_sensor("a"), d);
        let series = synth::historical_series(d, &test_sensor("a"), 20.0);
        store.apply_loaded(epoch, Ok((series, reading(23.5, 50.0))));
        assert!(store.snapshot().alarm_active);
    }
}
