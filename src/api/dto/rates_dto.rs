//! DTOs for the rate endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters of `GET /rates/latest`.
///
/// Shape selection is a presence check: both currencies present means a
/// pair conversion, anything else (including exactly one currency) is a
/// currency-listing request.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct RateQuery {
    /// Source currency code.
    pub from: Option<String>,
    /// Target currency code.
    pub to: Option<String>,
}

/// Query parameters of `GET /rates/historical/{date}`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PairQuery {
    /// Source currency code.
    pub from: String,
    /// Target currency code.
    pub to: String,
}

/// Query parameters of `GET /rates/series`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SeriesQuery {
    /// First date of the range (`YYYY-MM-DD`).
    pub from_date: String,
    /// Last date of the range.
    pub to_date: String,
    /// Source currency code.
    pub from: String,
    /// Target currency code.
    pub to: String,
}

/// Currency listing response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrencyListResponse {
    /// Available currency codes, alphabetical.
    pub currencies: Vec<String>,
}

/// Pair conversion response: `{base, rates: {TO: rate}}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PairRateResponse {
    /// Base currency of the quote.
    pub base: String,
    /// Single-entry map from target currency to rate.
    pub rates: BTreeMap<String, f64>,
}

/// Historical quote response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoricalResponse {
    /// Quote date.
    pub date: String,
    /// The quoted rate.
    pub rate: f64,
}

/// One point of a series response; the endpoint returns an ordered array
/// of these, ascending by date.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeriesPointDto {
    /// Quote date (`YYYY-MM-DD`).
    pub date: String,
    /// Rate on that date.
    pub rate: f64,
}
