//! Rate endpoints: latest (pair or listing), historical, series.
//!
//! Every handler records the inbound request before doing any work and
//! the service response after composing a successful reply; both records
//! are fire-and-forget, so a slow or failing store never delays the
//! caller.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, OriginalUri, Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    CurrencyListResponse, HistoricalResponse, PairQuery, PairRateResponse, RateQuery,
    SeriesPointDto, SeriesQuery,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::telemetry::ClientRequestMeta;
use crate::telemetry::events::{ConversionIntent, ServicePayload};

/// Builds the ingestion record for an inbound call from its raw parts.
fn client_meta(
    uri: &OriginalUri,
    headers: &HeaderMap,
    addr: SocketAddr,
    intent: ConversionIntent,
) -> ClientRequestMeta {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    ClientRequestMeta {
        endpoint: uri.path().to_string(),
        http_method: "GET".to_string(),
        user_agent,
        ip_address: addr.ip().to_string(),
        intent,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// `GET /rates/latest`: Latest pair rate, or the currency listing.
///
/// With both `from` and `to` present this is a pair conversion; in every
/// other case (no params, or only one of the two) it lists the available
/// currencies.
///
/// # Errors
///
/// Returns [`GatewayError`] when the upstream provider fails.
#[utoipa::path(
    get,
    path = "/api/v1/rates/latest",
    tag = "Rates",
    summary = "Latest pair rate or currency listing",
    description = "With `from` and `to` both present, returns the latest conversion rate for the pair. Otherwise returns the list of available currency codes.",
    params(RateQuery),
    responses(
        (status = 200, description = "Pair rate or currency listing", body = PairRateResponse),
        (status = 404, description = "No rate for the requested currency", body = ErrorResponse),
        (status = 502, description = "Upstream provider failure", body = ErrorResponse),
    )
)]
pub async fn latest_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    uri: OriginalUri,
    headers: HeaderMap,
    Query(query): Query<RateQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let intent = ConversionIntent {
        from_currency: query.from.clone(),
        to_currency: query.to.clone(),
        date: None,
        to_date: None,
    };
    state
        .ingestor
        .ingest_client_request(client_meta(&uri, &headers, addr, intent));

    let started = Instant::now();
    match (query.from, query.to) {
        (Some(from), Some(to)) => {
            let pair = state.conversion.latest_pair(&from, &to).await?;
            state.ingestor.ingest_service_response(
                elapsed_ms(started),
                200,
                ServicePayload::Rate {
                    currency: pair.currency.clone(),
                    rate: pair.rate,
                },
            );
            let mut rates = BTreeMap::new();
            rates.insert(pair.currency, pair.rate);
            Ok(Json(PairRateResponse {
                base: pair.base,
                rates,
            })
            .into_response())
        }
        _ => {
            let latest = state.conversion.latest_all().await?;
            let currencies: Vec<String> = latest.rates.into_keys().collect();
            state.ingestor.ingest_service_response(
                elapsed_ms(started),
                200,
                ServicePayload::Currencies {
                    currencies: currencies.clone(),
                },
            );
            Ok(Json(CurrencyListResponse { currencies }).into_response())
        }
    }
}

/// `GET /rates/historical/{date}`: Pair rate on a specific past date.
///
/// # Errors
///
/// Returns [`GatewayError::RateNotFound`] when the provider has no rate
/// for the requested currency or date.
#[utoipa::path(
    get,
    path = "/api/v1/rates/historical/{date}",
    tag = "Rates",
    summary = "Historical pair rate",
    params(
        ("date" = String, Path, description = "Quote date, YYYY-MM-DD"),
        PairQuery,
    ),
    responses(
        (status = 200, description = "Historical quote", body = HistoricalResponse),
        (status = 404, description = "No rate for the requested currency or date", body = ErrorResponse),
        (status = 502, description = "Upstream provider failure", body = ErrorResponse),
    )
)]
pub async fn historical_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path(date): Path<String>,
    Query(query): Query<PairQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let intent = ConversionIntent {
        from_currency: Some(query.from.clone()),
        to_currency: Some(query.to.clone()),
        date: Some(date.clone()),
        to_date: None,
    };
    state
        .ingestor
        .ingest_client_request(client_meta(&uri, &headers, addr, intent));

    let started = Instant::now();
    let quote = state
        .conversion
        .historical(&date, &query.from, &query.to)
        .await?;
    state.ingestor.ingest_service_response(
        elapsed_ms(started),
        200,
        ServicePayload::Historical { rate: quote.rate },
    );
    Ok(Json(HistoricalResponse {
        date: quote.date,
        rate: quote.rate,
    }))
}

/// `GET /rates/series`: Pair rates over a date range, ascending by date.
///
/// # Errors
///
/// Returns [`GatewayError`] when the upstream provider fails.
#[utoipa::path(
    get,
    path = "/api/v1/rates/series",
    tag = "Rates",
    summary = "Pair rate series over a date range",
    params(SeriesQuery),
    responses(
        (status = 200, description = "Ordered series of date/rate points", body = Vec<SeriesPointDto>),
        (status = 404, description = "No rate for the requested currency", body = ErrorResponse),
        (status = 502, description = "Upstream provider failure", body = ErrorResponse),
    )
)]
pub async fn series_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    uri: OriginalUri,
    headers: HeaderMap,
    Query(query): Query<SeriesQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let intent = ConversionIntent {
        from_currency: Some(query.from.clone()),
        to_currency: Some(query.to.clone()),
        date: Some(query.from_date.clone()),
        to_date: Some(query.to_date.clone()),
    };
    state
        .ingestor
        .ingest_client_request(client_meta(&uri, &headers, addr, intent));

    let started = Instant::now();
    let series = state
        .conversion
        .series(&query.from_date, &query.to_date, &query.from, &query.to)
        .await?;
    state.ingestor.ingest_service_response(
        elapsed_ms(started),
        200,
        ServicePayload::Series {
            rates: series.points.iter().map(|p| p.rate).collect(),
        },
    );
    let points: Vec<SeriesPointDto> = series
        .points
        .into_iter()
        .map(|p| SeriesPointDto {
            date: p.date,
            rate: p.rate,
        })
        .collect();
    Ok(Json(points))
}

/// Rate routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rates/latest", get(latest_handler))
        .route("/rates/historical/{date}", get(historical_handler))
        .route("/rates/series", get(series_handler))
}
