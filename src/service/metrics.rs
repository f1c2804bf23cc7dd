//! Dashboard aggregation over the recorded telemetry.

use std::sync::Arc;

use crate::error::GatewayError;
use crate::store::EventStore;
use crate::telemetry::events::ConversionPair;

/// Default number of devices returned by [`MetricsService::top_devices`].
pub const DEFAULT_TOP_DEVICES: usize = 5;

/// Read-only aggregation engine for the dashboard.
#[derive(Clone)]
pub struct MetricsService {
    store: Arc<dyn EventStore>,
}

impl std::fmt::Debug for MetricsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsService").finish_non_exhaustive()
    }
}

impl MetricsService {
    /// Creates a new `MetricsService` over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// The `n` most frequent client devices, most requests first. Fewer
    /// than `n` entries come back when fewer distinct devices exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    pub async fn top_devices(&self, n: usize) -> Result<Vec<String>, GatewayError> {
        self.store.top_devices(n).await
    }

    /// The conversion pair requested most often, or `None` when no pair
    /// conversion has been recorded yet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    pub async fn most_requested_pair(&self) -> Result<Option<ConversionPair>, GatewayError> {
        self.store.most_requested_pair().await
    }

    /// Mean service response time formatted as `"12.34 ms"`, or
    /// `"No data available"` when nothing has been recorded.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    pub async fn average_service_latency(&self) -> Result<String, GatewayError> {
        let average = self.store.average_response_time().await?;
        Ok(match average {
            Some(ms) => format!("{ms:.2} ms"),
            None => "No data available".to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use crate::telemetry::events::{ResponseData, ServiceResponseEvent};

    fn make_metrics() -> (MetricsService, Arc<MemoryEventStore>) {
        let store = Arc::new(MemoryEventStore::new());
        (
            MetricsService::new(Arc::clone(&store) as Arc<dyn EventStore>),
            store,
        )
    }

    #[tokio::test]
    async fn empty_store_reports_no_data() {
        let (metrics, _store) = make_metrics();
        let Ok(text) = metrics.average_service_latency().await else {
            panic!("aggregation failed");
        };
        assert_eq!(text, "No data available");
    }

    #[tokio::test]
    async fn latency_is_formatted_to_two_decimals() {
        let (metrics, store) = make_metrics();
        for elapsed in [10, 20, 30] {
            let result = store
                .insert_service_response(ServiceResponseEvent {
                    response_time_ms: elapsed,
                    status_code: 200,
                    request_type: "getRate".to_string(),
                    data: ResponseData::default(),
                })
                .await;
            assert!(result.is_ok());
        }

        let Ok(text) = metrics.average_service_latency().await else {
            panic!("aggregation failed");
        };
        assert_eq!(text, "20.00 ms");
    }

    #[tokio::test]
    async fn most_requested_pair_follows_counter() {
        let (metrics, store) = make_metrics();
        for _ in 0..4 {
            let result = store.increment_pair("EUR", "USD").await;
            assert!(result.is_ok());
        }
        let result = store.increment_pair("GBP", "JPY").await;
        assert!(result.is_ok());

        let Ok(Some(pair)) = metrics.most_requested_pair().await else {
            panic!("expected a top pair");
        };
        assert_eq!(pair.from_currency, "EUR");
        assert_eq!(pair.to_currency, "USD");
        assert_eq!(pair.count, 4);
    }
}
