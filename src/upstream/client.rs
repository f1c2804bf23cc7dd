//! HTTP client for the upstream exchange-rate provider.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::error::GatewayError;

/// Raw metadata of one upstream call, captured whether or not the call
/// succeeded so the attempt can always be logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallMeta {
    /// HTTP status returned by the provider. `0` means no response was
    /// received (transport failure).
    pub status: u16,
    /// Round-trip time in milliseconds.
    pub elapsed_ms: u64,
    /// Response body size in bytes.
    pub body_bytes: u64,
}

/// A successful fetch: the normalized value plus raw response metadata.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    /// Normalized result.
    pub value: T,
    /// Raw response metadata for telemetry.
    pub meta: CallMeta,
}

/// Failure modes of an upstream fetch. Both carry [`CallMeta`] so the
/// caller can still log the attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Non-2xx status, transport failure, or a malformed payload.
    #[error("upstream request failed: {detail}")]
    Upstream {
        /// What went wrong.
        detail: String,
        /// Metadata of the failed attempt.
        meta: CallMeta,
    },
    /// The provider responded but had no rate for the requested currency.
    #[error("no rate for {currency}")]
    RateNotFound {
        /// The currency that was missing from the response.
        currency: String,
        /// Metadata of the attempt.
        meta: CallMeta,
    },
}

impl FetchError {
    /// Metadata of the attempt, for telemetry on the failure arm.
    #[must_use]
    pub const fn meta(&self) -> CallMeta {
        match self {
            Self::Upstream { meta, .. } | Self::RateNotFound { meta, .. } => *meta,
        }
    }
}

impl From<FetchError> for GatewayError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Upstream { detail, meta } => Self::Upstream {
                status: (meta.status != 0).then_some(meta.status),
                detail,
            },
            FetchError::RateNotFound { currency, .. } => Self::RateNotFound(currency),
        }
    }
}

/// Latest rates for all currencies against the provider's base.
#[derive(Debug, Clone)]
pub struct LatestRates {
    /// Base currency the rates are quoted against.
    pub base: String,
    /// Quote date (`YYYY-MM-DD`).
    pub date: String,
    /// Rate per currency code, iterated in code order.
    pub rates: BTreeMap<String, f64>,
}

/// A single pair quote (latest or historical).
#[derive(Debug, Clone, PartialEq)]
pub struct PairRate {
    /// Base currency of the quote.
    pub base: String,
    /// Quote date.
    pub date: String,
    /// Target currency.
    pub currency: String,
    /// The quoted rate.
    pub rate: f64,
}

/// One point of a date-range series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Quote date (`YYYY-MM-DD`).
    pub date: String,
    /// Rate on that date.
    pub rate: f64,
}

/// A date-range series for one currency pair, ascending by date.
#[derive(Debug, Clone)]
pub struct RateSeries {
    /// Base currency of the quotes.
    pub base: String,
    /// First date of the range.
    pub start_date: String,
    /// Last date of the range.
    pub end_date: String,
    /// Points in ascending date order.
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Deserialize)]
struct LatestPayload {
    base: String,
    date: String,
    rates: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct HistoricalPayload {
    base: String,
    date: String,
    rates: Option<BTreeMap<String, f64>>,
}

/// Series payload: a date-keyed map of per-currency rates. `BTreeMap`
/// iteration normalizes whatever order the provider serialized the dates
/// in, since ISO-8601 strings sort lexicographically in date order.
#[derive(Debug, Deserialize)]
struct SeriesPayload {
    base: String,
    start_date: String,
    end_date: String,
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Client for the upstream exchange-rate API.
///
/// Endpoints consumed: `GET /latest`, `GET /latest?from=X&to=Y`,
/// `GET /{date}?from=X&to=Y`, `GET /{from}..{to}?from=X&to=Y`. All calls
/// share one bounded request timeout; a timed-out call surfaces as a
/// transport-level [`FetchError::Upstream`].
#[derive(Debug, Clone)]
pub struct RateClient {
    http: reqwest::Client,
    base_url: String,
}

impl RateClient {
    /// Creates a client for the given provider base URL with a bounded
    /// per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client init failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches latest rates for all currencies, no pair filter.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Upstream`] on non-2xx status, transport
    /// failure, or a malformed payload.
    pub async fn fetch_latest_all(&self) -> Result<Fetched<LatestRates>, FetchError> {
        let (body, meta) = self.get("/latest".to_string()).await?;
        let payload: LatestPayload = decode(&body, meta)?;
        Ok(Fetched {
            value: LatestRates {
                base: payload.base,
                date: payload.date,
                rates: payload.rates,
            },
            meta,
        })
    }

    /// Fetches the latest rate for a single pair.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Upstream`] on non-2xx status or transport
    /// failure, and [`FetchError::RateNotFound`] when the response lacks
    /// an entry for `to`.
    pub async fn fetch_latest_pair(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Fetched<PairRate>, FetchError> {
        let (body, meta) = self.get(format!("/latest?from={from}&to={to}")).await?;
        let payload: LatestPayload = decode(&body, meta)?;
        let rate = payload
            .rates
            .get(to)
            .copied()
            .ok_or_else(|| FetchError::RateNotFound {
                currency: to.to_string(),
                meta,
            })?;
        Ok(Fetched {
            value: PairRate {
                base: payload.base,
                date: payload.date,
                currency: to.to_string(),
                rate,
            },
            meta,
        })
    }

    /// Fetches the rate for a pair on a specific past date.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RateNotFound`] when the response carries no
    /// `rates` object or no entry for `to`, and [`FetchError::Upstream`]
    /// on non-2xx status or transport failure.
    pub async fn fetch_historical(
        &self,
        date: &str,
        from: &str,
        to: &str,
    ) -> Result<Fetched<PairRate>, FetchError> {
        let (body, meta) = self.get(format!("/{date}?from={from}&to={to}")).await?;
        let payload: HistoricalPayload = decode(&body, meta)?;
        let rate = payload
            .rates
            .as_ref()
            .and_then(|rates| rates.get(to))
            .copied()
            .ok_or_else(|| FetchError::RateNotFound {
                currency: to.to_string(),
                meta,
            })?;
        Ok(Fetched {
            value: PairRate {
                base: payload.base,
                date: payload.date,
                currency: to.to_string(),
                rate,
            },
            meta,
        })
    }

    /// Fetches a date-range series for a pair, ascending by date.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Upstream`] on non-2xx status, transport
    /// failure, or a malformed payload, and [`FetchError::RateNotFound`]
    /// when a day in the range lacks an entry for `to`.
    pub async fn fetch_series(
        &self,
        from_date: &str,
        to_date: &str,
        from: &str,
        to: &str,
    ) -> Result<Fetched<RateSeries>, FetchError> {
        let (body, meta) = self
            .get(format!("/{from_date}..{to_date}?from={from}&to={to}"))
            .await?;
        let payload: SeriesPayload = decode(&body, meta)?;

        let mut points = Vec::with_capacity(payload.rates.len());
        for (date, day_rates) in payload.rates {
            let rate = day_rates
                .get(to)
                .copied()
                .ok_or_else(|| FetchError::RateNotFound {
                    currency: to.to_string(),
                    meta,
                })?;
            points.push(SeriesPoint { date, rate });
        }

        Ok(Fetched {
            value: RateSeries {
                base: payload.base,
                start_date: payload.start_date,
                end_date: payload.end_date,
                points,
            },
            meta,
        })
    }

    /// Dispatches a GET and returns the body with its [`CallMeta`].
    /// Non-2xx statuses are errors, with the meta preserved.
    async fn get(&self, path_and_query: String) -> Result<(Vec<u8>, CallMeta), FetchError> {
        let url = format!("{}{path_and_query}", self.base_url);
        let started = Instant::now();

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                let meta = CallMeta {
                    status: 0,
                    elapsed_ms: elapsed_ms(started),
                    body_bytes: 0,
                };
                return Err(FetchError::Upstream {
                    detail: format!("transport failure: {e}"),
                    meta,
                });
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let meta = CallMeta {
                    status: status.as_u16(),
                    elapsed_ms: elapsed_ms(started),
                    body_bytes: 0,
                };
                return Err(FetchError::Upstream {
                    detail: format!("body read failed: {e}"),
                    meta,
                });
            }
        };

        let meta = CallMeta {
            status: status.as_u16(),
            elapsed_ms: elapsed_ms(started),
            body_bytes: body.len() as u64,
        };

        if !status.is_success() {
            return Err(FetchError::Upstream {
                detail: format!("upstream status {}", status.as_u16()),
                meta,
            });
        }

        Ok((body.to_vec(), meta))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8], meta: CallMeta) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Upstream {
        detail: format!("malformed upstream payload: {e}"),
        meta,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(base_url: &str) -> RateClient {
        let Ok(client) = RateClient::new(base_url, Duration::from_secs(5)) else {
            panic!("client construction failed");
        };
        client
    }

    #[tokio::test]
    async fn latest_pair_extracts_single_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("from", "EUR"))
            .and(query_param("to", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "amount": 1.0, "base": "EUR", "date": "2024-05-01",
                "rates": {"USD": 1.08}
            })))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let Ok(fetched) = client.fetch_latest_pair("EUR", "USD").await else {
            panic!("fetch failed");
        };
        assert_eq!(fetched.value.currency, "USD");
        assert!((fetched.value.rate - 1.08).abs() < f64::EPSILON);
        assert_eq!(fetched.meta.status, 200);
        assert!(fetched.meta.body_bytes > 0);
    }

    #[tokio::test]
    async fn missing_target_currency_is_rate_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "EUR", "date": "2024-05-01", "rates": {"GBP": 0.85}
            })))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let result = client.fetch_latest_pair("EUR", "USD").await;
        let Err(FetchError::RateNotFound { currency, meta }) = result else {
            panic!("expected RateNotFound");
        };
        assert_eq!(currency, "USD");
        assert_eq!(meta.status, 200);
    }

    #[tokio::test]
    async fn historical_without_rates_object_is_rate_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2020-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "EUR", "date": "2020-01-01"
            })))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let result = client.fetch_historical("2020-01-01", "EUR", "USD").await;
        assert!(matches!(result, Err(FetchError::RateNotFound { .. })));
    }

    #[tokio::test]
    async fn non_2xx_preserves_meta_for_logging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let result = client.fetch_latest_all().await;
        let Err(err) = result else {
            panic!("expected upstream error");
        };
        assert_eq!(err.meta().status, 503);
        assert_eq!(err.meta().body_bytes, "unavailable".len() as u64);
    }

    #[tokio::test]
    async fn series_is_ascending_regardless_of_upstream_order() {
        let server = MockServer::start().await;
        // Dates deliberately serialized out of order.
        let body = r#"{
            "base": "EUR", "start_date": "2020-01-01", "end_date": "2020-01-03",
            "rates": {
                "2020-01-03": {"USD": 1.3},
                "2020-01-01": {"USD": 1.1},
                "2020-01-02": {"USD": 1.2}
            }
        }"#;
        Mock::given(method("GET"))
            .and(path("/2020-01-01..2020-01-03"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "application/json"),
            )
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let Ok(fetched) = client
            .fetch_series("2020-01-01", "2020-01-03", "EUR", "USD")
            .await
        else {
            panic!("fetch failed");
        };
        let dates: Vec<&str> = fetched
            .value
            .points
            .iter()
            .map(|p| p.date.as_str())
            .collect();
        assert_eq!(dates, vec!["2020-01-01", "2020-01-02", "2020-01-03"]);
        assert_eq!(fetched.value.points.len(), 3);
    }

    #[tokio::test]
    async fn transport_failure_has_zero_status() {
        // Nothing listens on this port.
        let client = make_client("http://127.0.0.1:9");
        let result = client.fetch_latest_all().await;
        let Err(err) = result else {
            panic!("expected transport failure");
        };
        assert_eq!(err.meta().status, 0);

        let gateway_err: GatewayError = err.into();
        let GatewayError::Upstream { status, .. } = gateway_err else {
            panic!("expected Upstream variant");
        };
        assert!(status.is_none());
    }
}
