//! Handler-level tests for the dashboard flow: selection, snapshot,
//! history export.
//!
//! Run with: cargo test --test dashboard_flow_test

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;

use weatherdeck::common::AppState;
use weatherdeck::config::{Config, Deployment, SourceMode};
use weatherdeck::error::AppError;
use weatherdeck::routes::{dashboard, history, sensors};
use weatherdeck::source::synth;
use weatherdeck::store::LoadPhase;

fn test_config() -> Config {
    Config {
        source_mode: SourceMode::Mock,
        upstream_base_url: None,
        upstream_timeout_seconds: 5,
        sensors_file: None,
        refresh_interval_seconds: 5,
        alarm_threshold_c: 20.0,
        alarm_hold_seconds: 5,
        alarm_trigger_probability: 0.0,
        api_host: "127.0.0.1".to_string(),
        api_port: 0,
        disable_rate_limiting: true,
        rate_limit_metadata_per_second: 1,
        rate_limit_metadata_burst: 60,
        rate_limit_data_per_second: 10,
        rate_limit_data_burst: 60,
        cache_ttl_seconds: 60,
        cache_max_entries: 16,
        deployment: Deployment::Local,
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn wait_ready(state: &AppState) {
    for _ in 0..200 {
        if state.store.snapshot().phase == LoadPhase::Ready {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("store never reached Ready");
}

#[tokio::test]
async fn bundled_sensors_are_listed() {
    let state = AppState::new(test_config()).unwrap();
    let Json(list) = sensors::list_sensors(State(state)).await.unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0].id, "sensor-1");
    assert_eq!(list[0].display_name, "Garden Sensor");
}

#[tokio::test]
async fn selection_drives_store_to_ready() {
    let state = AppState::new(test_config()).unwrap();

    let Json(snap) = dashboard::post_selection(
        State(state.clone()),
        Json(dashboard::SelectionRequest {
            sensor_id: "sensor-1".to_string(),
            date: date("2024-01-15"),
        }),
    )
    .await
    .unwrap();
    assert_eq!(snap.phase, LoadPhase::Loading);

    wait_ready(&state).await;
    let snap = state.store.snapshot();
    assert_eq!(snap.series.len(), synth::SERIES_LEN);
    assert!(snap.current_temperature.is_some());
    assert_eq!(snap.selection.unwrap().sensor_id, "sensor-1");
}

#[tokio::test]
async fn unknown_sensor_is_rejected() {
    let state = AppState::new(test_config()).unwrap();
    let err = dashboard::post_selection(
        State(state),
        Json(dashboard::SelectionRequest {
            sensor_id: "sensor-99".to_string(),
            date: date("2024-01-15"),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn rapid_reselection_settles_on_the_last_sensor() {
    let state = AppState::new(test_config()).unwrap();
    let d = date("2024-01-15");

    for id in ["sensor-1", "sensor-2", "sensor-3"] {
        dashboard::post_selection(
            State(state.clone()),
            Json(dashboard::SelectionRequest {
                sensor_id: id.to_string(),
                date: d,
            }),
        )
        .await
        .unwrap();
    }

    wait_ready(&state).await;
    let snap = state.store.snapshot();
    assert_eq!(snap.selection.unwrap().sensor_id, "sensor-3");

    // The displayed series belongs to the final sensor, not an earlier one
    let basement = state.registry.get("sensor-3").unwrap();
    assert_eq!(snap.series, synth::historical_series(d, &basement, 20.0));
}

#[tokio::test]
async fn history_endpoint_returns_deterministic_json() {
    let state = AppState::new(test_config()).unwrap();
    let response = history::get_history(
        State(state.clone()),
        Query(history::HistoryQuery {
            sensor_id: "sensor-1".to_string(),
            date: date("2024-01-15"),
            format: "json".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let series: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(series.len(), synth::SERIES_LEN);
    assert_eq!(series[0]["time"], "00:00");
    assert_eq!(series[0]["temperature"], 19.2);
    assert_eq!(series[0]["humidity"], 44.0);
}

#[tokio::test]
async fn history_endpoint_exports_csv() {
    let state = AppState::new(test_config()).unwrap();
    let response = history::get_history(
        State(state),
        Query(history::HistoryQuery {
            sensor_id: "sensor-1".to_string(),
            date: date("2024-01-15"),
            format: "csv".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv; charset=utf-8"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = text.trim_end().lines().collect();
    assert_eq!(lines[0], "time,temperature,humidity,alert");
    assert_eq!(lines.len(), 1 + synth::SERIES_LEN);
    assert!(lines[1].starts_with("00:00,19.2,44"));
}

#[tokio::test]
async fn history_rejects_unknown_format_and_sensor() {
    let state = AppState::new(test_config()).unwrap();

    let err = history::get_history(
        State(state.clone()),
        Query(history::HistoryQuery {
            sensor_id: "sensor-1".to_string(),
            date: date("2024-01-15"),
            format: "xml".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = history::get_history(
        State(state),
        Query(history::HistoryQuery {
            sensor_id: "sensor-99".to_string(),
            date: date("2024-01-15"),
            format: "json".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
