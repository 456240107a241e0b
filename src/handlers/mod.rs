pub mod operations;
pub mod payments;
pub mod withdrawals;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// Health check
///
/// Probes Postgres and the Horizon API and reports overall service health.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy or degraded", body = crate::health::HealthResponse),
        (status = 503, description = "Service unhealthy")
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let postgres_checker = crate::health::PostgresChecker::new(state.db.clone());
    let horizon_checker = crate::health::HorizonChecker::new(state.horizon_client.clone());

    let health_response =
        crate::health::check_health(postgres_checker, horizon_checker, state.start_time).await;

    let status_code = match health_response.status.as_str() {
        "healthy" => StatusCode::OK,
        "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health_response))
}
