//! Conversion orchestrator: the public-facing gateway over the upstream
//! rate provider.
//!
//! Every operation follows the same path: call the provider, hand the
//! exchange (success or failure) to the telemetry ingestor without
//! waiting on it, then return the result. The response to the original
//! caller never blocks on ingestion, and a failed upstream call is still
//! logged before the error propagates.

use crate::error::GatewayError;
use crate::telemetry::TelemetryIngestor;
use crate::telemetry::events::{ConversionIntent, EndpointKind, ResponseData};
use crate::upstream::{FetchError, Fetched, LatestRates, PairRate, RateClient, RateSeries};

/// Orchestration layer for all conversion operations.
#[derive(Debug, Clone)]
pub struct ConversionService {
    rate_client: RateClient,
    ingestor: TelemetryIngestor,
}

impl ConversionService {
    /// Creates a new `ConversionService`.
    #[must_use]
    pub fn new(rate_client: RateClient, ingestor: TelemetryIngestor) -> Self {
        Self {
            rate_client,
            ingestor,
        }
    }

    /// Fetches the latest rates for all currencies.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] when the provider fails.
    pub async fn latest_all(&self) -> Result<LatestRates, GatewayError> {
        let result = self.rate_client.fetch_latest_all().await;
        match result {
            Ok(Fetched { value, meta }) => {
                let rates: Vec<f64> = value.rates.values().copied().collect();
                let data = ResponseData {
                    base_currency: Some(value.base.clone()),
                    start_date: None,
                    end_date: Some(value.date.clone()),
                    rate_count: value.rates.len() as u32,
                    average_rate: mean(&rates),
                    to_currencies: Some(value.rates.keys().cloned().collect()),
                    to_currency_values: Some(rates.iter().map(f64::to_string).collect()),
                };
                self.ingestor.ingest_server_exchange(
                    "GET",
                    EndpointKind::Latest,
                    meta,
                    ConversionIntent::default(),
                    data,
                );
                tracing::info!(base = %value.base, currencies = value.rates.len(), "fetched latest rates");
                Ok(value)
            }
            Err(err) => Err(self.log_failure(EndpointKind::Latest, ConversionIntent::default(), err)),
        }
    }

    /// Fetches the latest rate for one pair.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] when the provider fails and
    /// [`GatewayError::RateNotFound`] when it has no rate for `to`.
    pub async fn latest_pair(&self, from: &str, to: &str) -> Result<PairRate, GatewayError> {
        let intent = ConversionIntent {
            from_currency: Some(from.to_string()),
            to_currency: Some(to.to_string()),
            date: None,
            to_date: None,
        };
        let result = self.rate_client.fetch_latest_pair(from, to).await;
        match result {
            Ok(Fetched { value, meta }) => {
                let data = pair_data(&value, None);
                self.ingestor.ingest_server_exchange(
                    "GET",
                    EndpointKind::Latest,
                    meta,
                    intent,
                    data,
                );
                Ok(value)
            }
            Err(err) => Err(self.log_failure(EndpointKind::Latest, intent, err)),
        }
    }

    /// Fetches a pair's rate on a specific past date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] when the provider fails and
    /// [`GatewayError::RateNotFound`] when no rate exists for the
    /// requested currency or date.
    pub async fn historical(
        &self,
        date: &str,
        from: &str,
        to: &str,
    ) -> Result<PairRate, GatewayError> {
        let intent = ConversionIntent {
            from_currency: Some(from.to_string()),
            to_currency: Some(to.to_string()),
            date: Some(date.to_string()),
            to_date: None,
        };
        let result = self.rate_client.fetch_historical(date, from, to).await;
        match result {
            Ok(Fetched { value, meta }) => {
                let data = pair_data(&value, Some(date));
                self.ingestor.ingest_server_exchange(
                    "GET",
                    EndpointKind::Historical,
                    meta,
                    intent,
                    data,
                );
                Ok(value)
            }
            Err(err) => Err(self.log_failure(EndpointKind::Historical, intent, err)),
        }
    }

    /// Fetches a date-range series for a pair, ascending by date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] when the provider fails.
    pub async fn series(
        &self,
        from_date: &str,
        to_date: &str,
        from: &str,
        to: &str,
    ) -> Result<RateSeries, GatewayError> {
        let intent = ConversionIntent {
            from_currency: Some(from.to_string()),
            to_currency: Some(to.to_string()),
            date: Some(from_date.to_string()),
            to_date: Some(to_date.to_string()),
        };
        let result = self
            .rate_client
            .fetch_series(from_date, to_date, from, to)
            .await;
        match result {
            Ok(Fetched { value, meta }) => {
                let rates: Vec<f64> = value.points.iter().map(|p| p.rate).collect();
                let data = ResponseData {
                    base_currency: Some(value.base.clone()),
                    start_date: Some(value.start_date.clone()),
                    end_date: Some(value.end_date.clone()),
                    rate_count: value.points.len() as u32,
                    average_rate: mean(&rates),
                    to_currencies: None,
                    to_currency_values: Some(rates.iter().map(f64::to_string).collect()),
                };
                self.ingestor.ingest_server_exchange(
                    "GET",
                    EndpointKind::Historical,
                    meta,
                    intent,
                    data,
                );
                tracing::info!(points = value.points.len(), "fetched rate series");
                Ok(value)
            }
            Err(err) => Err(self.log_failure(EndpointKind::Historical, intent, err)),
        }
    }

    /// Logs a failed exchange (zeroed summary, meta from the error) and
    /// converts the error.
    fn log_failure(
        &self,
        kind: EndpointKind,
        intent: ConversionIntent,
        err: FetchError,
    ) -> GatewayError {
        self.ingestor.ingest_server_exchange(
            "GET",
            kind,
            err.meta(),
            intent,
            ResponseData::default(),
        );
        tracing::warn!(error = %err, endpoint = %kind, "upstream fetch failed");
        err.into()
    }
}

fn pair_data(value: &PairRate, start_date: Option<&str>) -> ResponseData {
    ResponseData {
        base_currency: Some(value.base.clone()),
        start_date: start_date.map(str::to_string),
        end_date: Some(value.date.clone()),
        rate_count: 1,
        average_rate: value.rate,
        to_currencies: Some(vec![value.currency.clone()]),
        to_currency_values: Some(vec![value.rate.to_string()]),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::{EventStore, MemoryEventStore};
    use crate::telemetry::BestEffortParser;
    use crate::telemetry::ingest::IngestWorkers;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_service(
        base_url: &str,
        store: Arc<MemoryEventStore>,
    ) -> (ConversionService, IngestWorkers) {
        let Ok(client) = RateClient::new(base_url, Duration::from_secs(5)) else {
            panic!("client construction failed");
        };
        let store: Arc<dyn EventStore> = store;
        let (ingestor, workers) = TelemetryIngestor::spawn(
            store,
            Arc::new(BestEffortParser),
            64,
            1,
            "127.0.0.1",
        );
        (ConversionService::new(client, ingestor), workers)
    }

    #[tokio::test]
    async fn successful_pair_fetch_logs_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "EUR", "date": "2024-05-01", "rates": {"USD": 1.08}
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryEventStore::new());
        let (service, workers) = make_service(&server.uri(), Arc::clone(&store));

        let result = service.latest_pair("EUR", "USD").await;
        let Ok(rate) = result else {
            panic!("fetch failed");
        };
        assert!((rate.rate - 1.08).abs() < f64::EPSILON);

        drop(service);
        workers.join().await;

        let Ok(requests) = store.server_requests().await else {
            panic!("read failed");
        };
        let Ok(responses) = store.server_responses().await else {
            panic!("read failed");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(responses.len(), 1);
        let Some(response) = responses.first() else {
            panic!("missing response");
        };
        assert_eq!(response.status_code, 200);
        assert_eq!(response.data.rate_count, 1);
        assert_eq!(
            response.data.to_currencies,
            Some(vec!["USD".to_string()])
        );
    }

    #[tokio::test]
    async fn failed_fetch_is_logged_before_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryEventStore::new());
        let (service, workers) = make_service(&server.uri(), Arc::clone(&store));

        let result = service.latest_all().await;
        assert!(matches!(result, Err(GatewayError::Upstream { .. })));

        drop(service);
        workers.join().await;

        // The failed attempt is still recorded, with a zeroed summary.
        let Ok(responses) = store.server_responses().await else {
            panic!("read failed");
        };
        let Some(response) = responses.first() else {
            panic!("failure was not logged");
        };
        assert_eq!(response.status_code, 503);
        assert_eq!(response.data, ResponseData::default());
    }

    #[tokio::test]
    async fn latest_all_logs_full_rate_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "EUR", "date": "2024-05-01",
                "rates": {"USD": 2.0, "GBP": 4.0}
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryEventStore::new());
        let (service, workers) = make_service(&server.uri(), Arc::clone(&store));

        let Ok(latest) = service.latest_all().await else {
            panic!("fetch failed");
        };
        assert_eq!(latest.rates.len(), 2);

        drop(service);
        workers.join().await;

        let Ok(responses) = store.server_responses().await else {
            panic!("read failed");
        };
        let Some(response) = responses.first() else {
            panic!("missing response");
        };
        assert_eq!(response.data.rate_count, 2);
        assert!((response.data.average_rate - 3.0).abs() < f64::EPSILON);
        let (Some(currencies), Some(values)) = (
            &response.data.to_currencies,
            &response.data.to_currency_values,
        ) else {
            panic!("lists must be populated");
        };
        assert_eq!(currencies.len(), values.len());
    }
}
