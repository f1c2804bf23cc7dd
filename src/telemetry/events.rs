//! Telemetry event model: the four record streams and the pair counter.
//!
//! Every inbound client call, every outbound provider exchange, and every
//! response this gateway returns is captured as one of these immutable
//! records. The [`crate::store::EventStore`] owns their lifetimes;
//! ingestion only appends and aggregation only reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversion parameters carried by an inbound client request.
///
/// All fields are optional: a currency-listing request carries none of
/// them, a pair conversion carries `from_currency`/`to_currency`, and the
/// historical/series endpoints add one or both dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionIntent {
    /// Source currency code, e.g. `"EUR"`.
    pub from_currency: Option<String>,
    /// Target currency code, e.g. `"USD"`.
    pub to_currency: Option<String>,
    /// Point-in-time date (`YYYY-MM-DD`) or series start date.
    pub date: Option<String>,
    /// Series end date.
    pub to_date: Option<String>,
}

/// One record per inbound API call. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequestEvent {
    /// Request path, e.g. `/api/v1/rates/latest`.
    pub endpoint: String,
    /// HTTP method of the inbound call.
    pub http_method: String,
    /// Device name derived from the `User-Agent` header (may be empty).
    pub device_name: String,
    /// Operating system derived from the `User-Agent` header (may be empty).
    pub operating_system: String,
    /// Source IP of the caller.
    pub ip_address: String,
    /// Conversion parameters extracted from the query string.
    pub request: ConversionIntent,
}

/// Which upstream endpoint family an outbound call targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// The `/latest` endpoint (with or without a pair filter).
    Latest,
    /// A date or date-range endpoint.
    Historical,
}

impl EndpointKind {
    /// Stable tag string used in persisted rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Historical => "historical",
        }
    }
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per outbound call to the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRequestEvent {
    /// HTTP method used for the outbound call.
    pub http_method: String,
    /// Upstream endpoint family.
    pub endpoint: EndpointKind,
    /// When the outbound call was dispatched.
    pub timestamp: DateTime<Utc>,
    /// Point-in-time or range-start date, when applicable.
    pub date: Option<String>,
    /// Range-end date, when applicable.
    pub to_date: Option<String>,
    /// Source currency filter, when applicable.
    pub from_currency: Option<String>,
    /// Target currency filter, when applicable.
    pub to_currency: Option<String>,
    /// Address this gateway called out from.
    pub ip_address: String,
}

/// Normalized rate summary attached to both server- and service-level
/// response events.
///
/// Invariant: whenever `to_currencies` and `to_currency_values` are both
/// present they are index-aligned lists of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Base currency of the quoted rates.
    pub base_currency: Option<String>,
    /// Start of the quoted date range.
    pub start_date: Option<String>,
    /// End of the quoted date range (or the single quote date).
    pub end_date: Option<String>,
    /// Number of rate values in the response.
    pub rate_count: u32,
    /// Arithmetic mean of the rate values (0.0 when there are none).
    pub average_rate: f64,
    /// Target currencies, aligned with `to_currency_values`.
    pub to_currencies: Option<Vec<String>>,
    /// Rate values as strings, aligned with `to_currencies`.
    pub to_currency_values: Option<Vec<String>>,
}

/// One record per upstream response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerResponseEvent {
    /// Round-trip time of the upstream call in milliseconds.
    pub response_time_ms: u64,
    /// HTTP status returned by the provider (0 if no response arrived).
    pub status_code: u16,
    /// Size of the response body in bytes.
    pub payload_bytes: u64,
    /// Normalized rate summary.
    pub data: ResponseData,
}

/// One record per response this gateway returned to its own caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponseEvent {
    /// Time taken to serve the request in milliseconds.
    pub response_time_ms: u64,
    /// HTTP status sent to the caller.
    pub status_code: u16,
    /// Request-type tag (`getRate`, `getCurrencies`, `historical`,
    /// `timeSeries`, or `unknown`).
    pub request_type: String,
    /// Derived rate summary per the request-type rules.
    pub data: ResponseData,
}

/// Per-(from, to) conversion request tally. Upserted, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionPair {
    /// Source currency code.
    pub from_currency: String,
    /// Target currency code.
    pub to_currency: String,
    /// Monotonically increasing request count.
    pub count: u64,
}

/// Typed response payload for service-response ingestion.
///
/// Each request type carries exactly the data its derived-metrics rules
/// need, so [`ServicePayload::response_data`] is checked exhaustively at
/// compile time instead of branching on a string tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ServicePayload {
    /// A single pair conversion (`getRate`).
    Rate {
        /// Target currency of the quote.
        currency: String,
        /// The quoted rate.
        rate: f64,
    },
    /// A currency listing (`getCurrencies`).
    Currencies {
        /// Available currency codes.
        currencies: Vec<String>,
    },
    /// A date-range series (`timeSeries`).
    Series {
        /// Rate values in date order.
        rates: Vec<f64>,
    },
    /// A single historical quote (`historical`).
    Historical {
        /// The quoted rate.
        rate: f64,
    },
    /// Unrecognized request-type tag. Produces an all-zero summary
    /// rather than failing the request.
    Unknown,
}

impl ServicePayload {
    /// Stable request-type tag for the persisted event.
    #[must_use]
    pub const fn kind_tag(&self) -> &'static str {
        match self {
            Self::Rate { .. } => "getRate",
            Self::Currencies { .. } => "getCurrencies",
            Self::Series { .. } => "timeSeries",
            Self::Historical { .. } => "historical",
            Self::Unknown => "unknown",
        }
    }

    /// Reconstructs a payload from the string-tag public surface.
    ///
    /// `value` is interpreted per tag: a rates object for `getRate`, an
    /// array of currency codes for `getCurrencies`, an array of numbers
    /// for `timeSeries`, and an object with a `rate` field for
    /// `historical`. An unrecognized tag (or a value that does not match
    /// the tag's shape) yields [`ServicePayload::Unknown`], never an
    /// error.
    #[must_use]
    pub fn from_tag(tag: &str, value: &serde_json::Value) -> Self {
        match tag {
            "getRate" => value
                .get("rates")
                .and_then(serde_json::Value::as_object)
                .and_then(|rates| {
                    rates
                        .iter()
                        .next()
                        .and_then(|(currency, rate)| rate.as_f64().map(|r| (currency.clone(), r)))
                })
                .map_or(Self::Unknown, |(currency, rate)| Self::Rate {
                    currency,
                    rate,
                }),
            "getCurrencies" => value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .map_or(Self::Unknown, |currencies| Self::Currencies { currencies }),
            "timeSeries" => value
                .as_array()
                .map(|items| items.iter().filter_map(serde_json::Value::as_f64).collect())
                .map_or(Self::Unknown, |rates| Self::Series { rates }),
            "historical" => value
                .get("rate")
                .and_then(serde_json::Value::as_f64)
                .map_or(Self::Unknown, |rate| Self::Historical { rate }),
            _ => Self::Unknown,
        }
    }

    /// Derives the persisted [`ResponseData`] for this payload.
    ///
    /// Population rules per request type:
    /// - `getRate`: one currency + one value, count 1, average = the value.
    /// - `getCurrencies`: currencies list only, no values.
    /// - `timeSeries`: count = series length, average = arithmetic mean,
    ///   values list only.
    /// - `historical`: count 1, the single value, no currencies list.
    /// - unknown tag: everything at its zero value.
    #[must_use]
    pub fn response_data(&self) -> ResponseData {
        match self {
            Self::Rate { currency, rate } => ResponseData {
                rate_count: 1,
                average_rate: *rate,
                to_currencies: Some(vec![currency.clone()]),
                to_currency_values: Some(vec![rate.to_string()]),
                ..ResponseData::default()
            },
            Self::Currencies { currencies } => ResponseData {
                rate_count: 0,
                average_rate: 0.0,
                to_currencies: Some(currencies.clone()),
                to_currency_values: None,
                ..ResponseData::default()
            },
            Self::Series { rates } => {
                let count = rates.len();
                let average = if count == 0 {
                    0.0
                } else {
                    rates.iter().sum::<f64>() / count as f64
                };
                ResponseData {
                    rate_count: count as u32,
                    average_rate: average,
                    to_currencies: None,
                    to_currency_values: Some(rates.iter().map(f64::to_string).collect()),
                    ..ResponseData::default()
                }
            }
            Self::Historical { rate } => ResponseData {
                rate_count: 1,
                average_rate: *rate,
                to_currencies: None,
                to_currency_values: Some(vec![rate.to_string()]),
                ..ResponseData::default()
            },
            Self::Unknown => ResponseData::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rate_payload_derives_single_value() {
        let payload = ServicePayload::Rate {
            currency: "USD".to_string(),
            rate: 1.08,
        };
        let data = payload.response_data();
        assert_eq!(data.rate_count, 1);
        assert!((data.average_rate - 1.08).abs() < f64::EPSILON);
        assert_eq!(data.to_currencies, Some(vec!["USD".to_string()]));
        assert_eq!(data.to_currency_values, Some(vec!["1.08".to_string()]));
    }

    #[test]
    fn currencies_payload_has_no_values_list() {
        let currencies: Vec<String> = ["EUR", "USD", "GBP", "JPY", "CHF", "AUD", "CAD"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let payload = ServicePayload::Currencies { currencies };
        let data = payload.response_data();
        let Some(listed) = data.to_currencies else {
            panic!("currencies list must be populated");
        };
        assert_eq!(listed.len(), 7);
        assert!(data.to_currency_values.is_none());
        assert_eq!(data.rate_count, 0);
    }

    #[test]
    fn series_payload_averages_all_values() {
        let payload = ServicePayload::Series {
            rates: vec![1.0, 2.0, 3.0],
        };
        let data = payload.response_data();
        assert_eq!(data.rate_count, 3);
        assert!((data.average_rate - 2.0).abs() < f64::EPSILON);
        assert!(data.to_currencies.is_none());
        let Some(values) = data.to_currency_values else {
            panic!("values list must be populated");
        };
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn historical_payload_holds_single_rate() {
        let payload = ServicePayload::Historical { rate: 0.92 };
        let data = payload.response_data();
        assert_eq!(data.rate_count, 1);
        assert!(data.to_currencies.is_none());
        assert_eq!(data.to_currency_values, Some(vec!["0.92".to_string()]));
    }

    #[test]
    fn unknown_tag_yields_zero_values() {
        let payload = ServicePayload::from_tag("bulkExport", &serde_json::json!({}));
        assert_eq!(payload, ServicePayload::Unknown);
        let data = payload.response_data();
        assert_eq!(data, ResponseData::default());
    }

    #[test]
    fn from_tag_parses_rate_shape() {
        let value = serde_json::json!({"base": "EUR", "rates": {"USD": 1.1}});
        let payload = ServicePayload::from_tag("getRate", &value);
        assert_eq!(
            payload,
            ServicePayload::Rate {
                currency: "USD".to_string(),
                rate: 1.1
            }
        );
        assert_eq!(payload.kind_tag(), "getRate");
    }
}
