use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::source::ReadingSource;
use crate::store::Snapshot;

/// Current dashboard state
///
/// A point-in-time snapshot of the store: selection, load phase, smoothed
/// current readings, the 24-hour series, and the alarm flag. The embedded
/// page polls this.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Snapshot retrieved successfully", body = Snapshot),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.store.snapshot())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectionRequest {
    #[serde(alias = "sensorId")]
    pub sensor_id: String,
    /// Calendar date, `YYYY-MM-DD`
    pub date: NaiveDate,
}

/// Change the dashboard selection
///
/// Switches the store to the given sensor and date and starts loading.
/// Re-posting the current selection is the retry path after an error.
#[utoipa::path(
    post,
    path = "/api/selection",
    request_body = SelectionRequest,
    responses(
        (status = 200, description = "Selection accepted, loading", body = Snapshot),
        (status = 404, description = "Unknown sensor"),
    ),
    tag = "dashboard"
)]
pub async fn post_selection(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> AppResult<Json<Snapshot>> {
    let mut sensor = state.registry.get(&request.sensor_id);

    // In remote mode an unknown id may just mean a stale inventory
    if sensor.is_none() {
        if let ReadingSource::RemoteBacked { client, .. } = state.source.as_ref() {
            let _ = state.registry.refresh_from_upstream(client).await;
            sensor = state.registry.get(&request.sensor_id);
        }
    }

    let sensor = sensor
        .ok_or_else(|| AppError::NotFound(format!("Sensor '{}' not found", request.sensor_id)))?;

    tracing::info!(sensor_id = %sensor.id, date = %request.date, "Selection changed");
    state.store.select(sensor, request.date);

    Ok(Json(state.store.snapshot()))
}

pub async fn page() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=60")],
        Html(DASHBOARD_HTML),
    )
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Weather Monitoring Dashboard</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/uplot@1.6.31/dist/uPlot.min.css">
    <style>
        :root {
            --bg: #f8fafc;
            --surface: #ffffff;
            --border: #e2e8f0;
            --text: #1e293b;
            --muted: #64748b;
            --accent: #2563eb;
            --danger: #dc2626;
        }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: system-ui, -apple-system, sans-serif; background: var(--bg); color: var(--text); min-height: 100vh; }

        .container { max-width: 1100px; margin: 0 auto; padding: 1.5rem; }

        header {
            display: flex;
            justify-content: space-between;
            align-items: center;
            margin-bottom: 1.5rem;
            flex-wrap: wrap;
            gap: 1rem;
        }
        h1 { font-size: 1.25rem; font-weight: 600; }
        .controls { display: flex; gap: 0.5rem; }
        select, input[type="date"], button {
            padding: 0.5rem 0.75rem;
            border: 1px solid var(--border);
            border-radius: 0.375rem;
            font-size: 0.875rem;
            background: var(--surface);
            cursor: pointer;
        }

        .banner {
            display: none;
            background: antiquewhite;
            border: 1px solid var(--danger);
            color: var(--danger);
            border-radius: 0.5rem;
            padding: 0.75rem 1rem;
            margin-bottom: 1rem;
            font-size: 0.875rem;
            animation: pulse 1.2s ease-in-out infinite;
        }
        .banner.active { display: block; }
        @keyframes pulse { 50% { opacity: 0.55; } }

        .grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 1rem; margin-bottom: 1rem; }
        .card {
            background: var(--surface);
            border: 1px solid var(--border);
            border-radius: 0.5rem;
            padding: 1.25rem;
        }
        .card .label { font-size: 0.75rem; color: var(--muted); text-transform: uppercase; letter-spacing: 0.05em; }
        .card .value { font-size: 2rem; font-weight: 600; margin-top: 0.25rem; }
        .card .value.small { font-size: 1.1rem; }

        .chart-card { background: var(--surface); border: 1px solid var(--border); border-radius: 0.5rem; padding: 1.25rem; }
        .chart-card h2 { font-size: 0.95rem; margin-bottom: 0.25rem; }
        .chart-card p { font-size: 0.8rem; color: var(--muted); margin-bottom: 1rem; }

        .error-box {
            display: none;
            background: var(--surface);
            border: 1px solid var(--danger);
            border-radius: 0.5rem;
            padding: 1.25rem;
            margin-bottom: 1rem;
        }
        .error-box.active { display: block; }
        .error-box p { margin-bottom: 0.75rem; font-size: 0.875rem; }
        .skeleton { opacity: 0.4; }
    </style>
</head>
<body>
<div class="container">
    <header>
        <h1>Weather Monitoring Dashboard</h1>
        <div class="controls">
            <input type="date" id="date">
            <select id="sensor"></select>
        </div>
    </header>

    <div class="banner" id="alarm">
        <strong>Warning!</strong> Environmental conditions have exceeded normal parameters. Please check the system.
    </div>

    <div class="error-box" id="error">
        <p id="error-message"></p>
        <button id="retry">Retry</button>
    </div>

    <div class="grid" id="cards">
        <div class="card">
            <div class="label">Current Temperature</div>
            <div class="value" id="temp">--</div>
        </div>
        <div class="card">
            <div class="label">Current Humidity</div>
            <div class="value" id="humidity">--</div>
        </div>
        <div class="card">
            <div class="label">Status</div>
            <div class="value small" id="status">Idle</div>
        </div>
    </div>

    <div class="chart-card">
        <h2>Historical Data</h2>
        <p>Temperature and humidity over 24 hours</p>
        <div id="chart"></div>
    </div>
</div>

<script src="https://cdn.jsdelivr.net/npm/uplot@1.6.31/dist/uPlot.iife.min.js"></script>
<script>
const sensorSelect = document.getElementById('sensor');
const dateInput = document.getElementById('date');
let chart = null;
let timeLabels = [];

async function api(path, opts) {
    const r = await fetch(path, opts);
    if (!r.ok) throw new Error('HTTP ' + r.status);
    return r.json();
}

function showError(message) {
    document.getElementById('error').classList.add('active');
    document.getElementById('error-message').textContent = message;
}

function hideError() {
    document.getElementById('error').classList.remove('active');
}

async function postSelection() {
    hideError();
    try {
        await api('/api/selection', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ sensor_id: sensorSelect.value, date: dateInput.value }),
        });
        refresh();
    } catch (e) {
        showError('Failed to load data. Please check your connection and try again.');
    }
}

function renderChart(series) {
    timeLabels = series.map(r => r.time);
    const data = [
        series.map((_, i) => i),
        series.map(r => r.temperature),
        series.map(r => r.humidity),
    ];
    if (chart) { chart.destroy(); }
    chart = new uPlot({
        width: Math.min(1040, document.querySelector('.chart-card').clientWidth - 40),
        height: 320,
        scales: { x: { time: false } },
        axes: [
            { values: (u, ticks) => ticks.map(t => timeLabels[t] ?? '') },
            {},
        ],
        series: [
            {},
            { label: 'Temperature (°C)', stroke: '#ef4444', width: 2 },
            { label: 'Humidity (%)', stroke: '#3b82f6', width: 2 },
        ],
    }, data, document.getElementById('chart'));
}

function render(snap) {
    document.getElementById('alarm').classList.toggle('active', snap.alarm_active);
    const cards = document.getElementById('cards');

    if (snap.phase === 'error') {
        showError(snap.error || 'Failed to load data. Please check your connection and try again.');
        document.getElementById('status').textContent = 'Error';
        return;
    }
    hideError();

    cards.classList.toggle('skeleton', snap.phase === 'loading');
    document.getElementById('status').textContent =
        snap.phase.charAt(0).toUpperCase() + snap.phase.slice(1);

    if (snap.current_temperature !== null) {
        document.getElementById('temp').textContent = snap.current_temperature.toFixed(1) + ' °C';
    }
    if (snap.current_humidity !== null) {
        document.getElementById('humidity').textContent = snap.current_humidity.toFixed(0) + ' %';
    }
    if (snap.phase === 'ready') {
        renderChart(snap.series);
    }
}

async function refresh() {
    try {
        render(await api('/api/dashboard'));
    } catch (e) {
        // transient; keep showing the last state and try again next poll
    }
}

async function init() {
    dateInput.value = new Date().toISOString().split('T')[0];
    dateInput.addEventListener('change', postSelection);
    sensorSelect.addEventListener('change', postSelection);
    document.getElementById('retry').addEventListener('click', postSelection);

    let sensors;
    try {
        sensors = await api('/api/sensors');
    } catch (e) {
        showError('Failed to load sensors. Please check your connection and try again.');
        return;
    }
    for (const s of sensors) {
        const opt = document.createElement('option');
        opt.value = s.id;
        opt.textContent = s.display_name;
        sensorSelect.appendChild(opt);
    }
    if (sensors.length > 0) {
        sensorSelect.value = sensors[0].id;
        await postSelection();
    }
    setInterval(refresh, 2000);
}

init();
</script>
</body>
</html>
"##;
