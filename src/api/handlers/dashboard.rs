//! Dashboard endpoints: aggregated metrics and raw event listings.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::DashboardMetricsResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::metrics::DEFAULT_TOP_DEVICES;

/// `GET /dashboard/metrics`: Aggregated operational metrics.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/metrics",
    tag = "Dashboard",
    summary = "Aggregated metrics",
    description = "Most requested conversion pair, top client devices, and mean service latency.",
    responses(
        (status = 200, description = "Aggregated metrics", body = DashboardMetricsResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn metrics_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let most_requested_pair = state
        .metrics
        .most_requested_pair()
        .await?
        .map(Into::into);
    let top_devices = state.metrics.top_devices(DEFAULT_TOP_DEVICES).await?;
    let average_response_time = state.metrics.average_service_latency().await?;

    Ok(Json(DashboardMetricsResponse {
        most_requested_pair,
        top_devices,
        average_response_time,
    }))
}

/// `GET /dashboard/client-requests`: All recorded inbound requests.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/client-requests",
    tag = "Dashboard",
    summary = "All recorded client requests",
    responses(
        (status = 200, description = "Client request records", body = serde_json::Value),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn client_requests_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.client_requests().await?))
}

/// `GET /dashboard/server-requests`: All recorded outbound requests.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/server-requests",
    tag = "Dashboard",
    summary = "All recorded provider requests",
    responses(
        (status = 200, description = "Provider request records", body = serde_json::Value),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn server_requests_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.server_requests().await?))
}

/// `GET /dashboard/server-responses`: All recorded provider responses.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/server-responses",
    tag = "Dashboard",
    summary = "All recorded provider responses",
    responses(
        (status = 200, description = "Provider response records", body = serde_json::Value),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn server_responses_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.server_responses().await?))
}

/// `GET /dashboard/service-responses`: All recorded service responses.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/service-responses",
    tag = "Dashboard",
    summary = "All recorded service responses",
    responses(
        (status = 200, description = "Service response records", body = serde_json::Value),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn service_responses_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.service_responses().await?))
}

/// Dashboard routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/metrics", get(metrics_handler))
        .route("/dashboard/client-requests", get(client_requests_handler))
        .route("/dashboard/server-requests", get(server_requests_handler))
        .route("/dashboard/server-responses", get(server_responses_handler))
        .route(
            "/dashboard/service-responses",
            get(service_responses_handler),
        )
}
