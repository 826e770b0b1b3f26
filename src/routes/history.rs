use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::source::Reading;

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Sensor to read
    #[serde(alias = "sensorId")]
    pub sensor_id: String,
    /// Calendar date, `YYYY-MM-DD`
    pub date: NaiveDate,
    /// Response format: `json` (default) or `csv`
    #[serde(default = "default_format")]
    pub format: String,
}

/// 24-hour historical series for a sensor and date
///
/// Deterministic sources always return 12 points; a remote source with no
/// data for the range returns an empty array (not an error).
#[utoipa::path(
    get,
    path = "/api/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Series retrieved successfully", body = Vec<Reading>),
        (status = 404, description = "Unknown sensor"),
        (status = 502, description = "Reading source unreachable"),
    ),
    tag = "history"
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Response> {
    let sensor = state
        .registry
        .get(&query.sensor_id)
        .ok_or_else(|| AppError::NotFound(format!("Sensor '{}' not found", query.sensor_id)))?;

    let series = state
        .source
        .historical_series(&sensor, query.date, state.config.alarm_threshold_c)
        .await?;

    match query.format.to_lowercase().as_str() {
        "csv" => build_csv_response(&series, &sensor.id, query.date),
        "json" => Ok(Json(series).into_response()),
        other => Err(AppError::BadRequest(format!(
            "Unsupported format '{other}', expected 'json' or 'csv'"
        ))),
    }
}

fn build_csv_response(series: &[Reading], sensor_id: &str, date: NaiveDate) -> AppResult<Response> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for reading in series {
        writer
            .serialize(reading)
            .map_err(|e| AppError::Internal(format!("CSV encoding failed: {e}")))?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV encoding failed: {e}")))?;

    let filename = format!("readings-{sensor_id}-{date}.csv");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
