//! DTOs for the dashboard endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::telemetry::events::ConversionPair;

/// The most requested conversion pair, with a display label.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversionPairDto {
    /// Source currency code.
    pub from_currency: String,
    /// Target currency code.
    pub to_currency: String,
    /// How many times the pair was requested.
    pub count: u64,
    /// Display form, e.g. `"EUR to USD"`.
    pub label: String,
}

impl From<ConversionPair> for ConversionPairDto {
    fn from(pair: ConversionPair) -> Self {
        let label = format!("{} to {}", pair.from_currency, pair.to_currency);
        Self {
            from_currency: pair.from_currency,
            to_currency: pair.to_currency,
            count: pair.count,
            label,
        }
    }
}

/// Aggregated dashboard metrics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardMetricsResponse {
    /// Most requested conversion pair, absent when nothing was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_requested_pair: Option<ConversionPairDto>,
    /// Most frequent client devices, most requests first.
    pub top_devices: Vec<String>,
    /// Mean service latency, `"12.34 ms"` or `"No data available"`.
    pub average_response_time: String,
}
