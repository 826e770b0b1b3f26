//! Deterministic synthetic readings.
//!
//! The historical path is a pure function of (date, sensor): the calendar
//! date is folded into an integer seed and `sin(seed + i)` drives a
//! repeatable wobble around the sensor's base values. Same inputs, same
//! series, always — the dashboard relies on this when re-rendering a past
//! day.
//!
//! The current-reading path is deliberately *not* deterministic: it
//! simulates live sensor noise with uniform jitter around the base values.

use chrono::{Datelike, Local, NaiveDate, Timelike};
use rand::Rng;

use crate::registry::Sensor;
use crate::source::Reading;

/// Points per 24-hour series, one every two hours.
pub const SERIES_LEN: usize = 12;

const HUMIDITY_MIN: f64 = 30.0;
const HUMIDITY_MAX: f64 = 70.0;

/// Integer seed for a calendar date. Month is zero-based, so
/// 2024-01-15 folds to `15 + 0*31 + 2024*365 = 738775`.
#[must_use]
pub fn date_seed(date: NaiveDate) -> i64 {
    i64::from(date.day()) + i64::from(date.month0()) * 31 + i64::from(date.year()) * 365
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn clamp_humidity(x: f64) -> f64 {
    x.round().clamp(HUMIDITY_MIN, HUMIDITY_MAX)
}

/// Generate the 24-hour series for a sensor on a given date.
///
/// Always returns exactly [`SERIES_LEN`] readings at hours 00, 02, .., 22,
/// temperatures rounded to one decimal, humidity clamped to [30, 70].
#[must_use]
pub fn historical_series(date: NaiveDate, sensor: &Sensor, alarm_threshold: f64) -> Vec<Reading> {
    let seed = date_seed(date);

    (0..SERIES_LEN)
        .map(|i| {
            let hour = 2 * i;
            let step = i as f64;
            let random_factor = ((seed + i as i64) as f64).sin() * 3.0;

            let temperature = round1(
                sensor.base_temperature
                    + random_factor * sensor.temperature_variability
                    + step * 0.3,
            );
            let humidity = clamp_humidity(
                sensor.base_humidity + random_factor * sensor.humidity_variability * 2.0
                    - step * 0.2,
            );

            Reading {
                time: format!("{hour:02}:00"),
                temperature,
                humidity,
                alert: temperature > alarm_threshold,
            }
        })
        .collect()
}

/// Sample a "live" reading: base values plus uniform jitter of ±1.0 °C and
/// ±2.5 humidity, stamped with the local wall-clock time.
#[must_use]
pub fn current_reading(sensor: &Sensor, alarm_threshold: f64) -> Reading {
    let mut rng = rand::thread_rng();
    let temperature_jitter: f64 = rng.gen_range(-1.0..1.0);
    let humidity_jitter: f64 = rng.gen_range(-2.5..2.5);

    let temperature = round1(sensor.base_temperature + temperature_jitter);
    let humidity = clamp_humidity(sensor.base_humidity + humidity_jitter);

    let now = Local::now();
    Reading {
        time: format!("{:02}:{:02}", now.hour(), now.minute()),
        temperature,
        humidity,
        alert: temperature > alarm_threshold,
    }
}
