use axum::http::StatusCode;

/// Liveness probe
///
/// Answers 200 as long as the process is up. Says nothing about the
/// reading source; a down upstream shows up in the dashboard snapshot,
/// not here. Unlimited, probe-friendly.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is alive"),
    ),
    tag = "health"
)]
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
