use axum::{extract::State, Json};

use crate::common::AppState;
use crate::error::AppResult;
use crate::registry::Sensor;
use crate::source::ReadingSource;

/// List all known sensors
///
/// In remote mode the inventory is refreshed from the upstream first,
/// falling back to the last-known-good list when the upstream is down.
#[utoipa::path(
    get,
    path = "/api/sensors",
    responses(
        (status = 200, description = "Sensors retrieved successfully", body = Vec<Sensor>),
        (status = 503, description = "Sensor list unavailable and nothing cached"),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(State(state): State<AppState>) -> AppResult<Json<Vec<Sensor>>> {
    let sensors = match state.source.as_ref() {
        ReadingSource::RemoteBacked { client, .. } => {
            state.registry.refresh_from_upstream(client).await?
        }
        ReadingSource::LocalDeterministic => state.registry.list(),
    };

    Ok(Json(sensors))
}
