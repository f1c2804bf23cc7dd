//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// OpenAPI document covering the full REST surface.
#[derive(Debug, utoipa::OpenApi)]
#[openapi(
    info(
        title = "fx-gateway API",
        description = "Currency conversion proxy with request/response telemetry"
    ),
    paths(
        handlers::rates::latest_handler,
        handlers::rates::historical_handler,
        handlers::rates::series_handler,
        handlers::dashboard::metrics_handler,
        handlers::dashboard::client_requests_handler,
        handlers::dashboard::server_requests_handler,
        handlers::dashboard::server_responses_handler,
        handlers::dashboard::service_responses_handler,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::CurrencyListResponse,
        dto::PairRateResponse,
        dto::HistoricalResponse,
        dto::SeriesPointDto,
        dto::DashboardMetricsResponse,
        dto::ConversionPairDto,
        crate::error::ErrorResponse,
    ))
)]
pub struct ApiDoc;
