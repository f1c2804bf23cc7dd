//! In-memory [`EventStore`] implementation.
//!
//! Used by unit tests and when `PERSISTENCE_ENABLED=false`. Event streams
//! are `RwLock`-guarded vectors; the pair counter tracks an insertion
//! sequence so tie-breaks are stable across calls.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::EventStore;
use crate::error::GatewayError;
use crate::telemetry::events::{
    ClientRequestEvent, ConversionPair, ServerRequestEvent, ServerResponseEvent,
    ServiceResponseEvent,
};

/// Counter cell: running count plus the sequence number of first sighting.
#[derive(Debug, Clone, Copy)]
struct PairCount {
    count: u64,
    first_seen: usize,
}

/// Non-durable store backed by in-process collections.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    client_requests: RwLock<Vec<ClientRequestEvent>>,
    server_requests: RwLock<Vec<ServerRequestEvent>>,
    server_responses: RwLock<Vec<ServerResponseEvent>>,
    service_responses: RwLock<Vec<ServiceResponseEvent>>,
    pairs: RwLock<HashMap<(String, String), PairCount>>,
}

impl MemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_client_request(&self, event: ClientRequestEvent) -> Result<(), GatewayError> {
        self.client_requests.write().await.push(event);
        Ok(())
    }

    async fn insert_server_request(&self, event: ServerRequestEvent) -> Result<(), GatewayError> {
        self.server_requests.write().await.push(event);
        Ok(())
    }

    async fn insert_server_response(&self, event: ServerResponseEvent) -> Result<(), GatewayError> {
        self.server_responses.write().await.push(event);
        Ok(())
    }

    async fn insert_service_response(
        &self,
        event: ServiceResponseEvent,
    ) -> Result<(), GatewayError> {
        self.service_responses.write().await.push(event);
        Ok(())
    }

    async fn increment_pair(&self, from: &str, to: &str) -> Result<(), GatewayError> {
        let mut pairs = self.pairs.write().await;
        let next_seq = pairs.len();
        pairs
            .entry((from.to_string(), to.to_string()))
            .and_modify(|cell| cell.count += 1)
            .or_insert(PairCount {
                count: 1,
                first_seen: next_seq,
            });
        Ok(())
    }

    async fn client_requests(&self) -> Result<Vec<ClientRequestEvent>, GatewayError> {
        Ok(self.client_requests.read().await.clone())
    }

    async fn server_requests(&self) -> Result<Vec<ServerRequestEvent>, GatewayError> {
        Ok(self.server_requests.read().await.clone())
    }

    async fn server_responses(&self) -> Result<Vec<ServerResponseEvent>, GatewayError> {
        Ok(self.server_responses.read().await.clone())
    }

    async fn service_responses(&self) -> Result<Vec<ServiceResponseEvent>, GatewayError> {
        Ok(self.service_responses.read().await.clone())
    }

    async fn top_devices(&self, n: usize) -> Result<Vec<String>, GatewayError> {
        let requests = self.client_requests.read().await;
        // First-seen iteration order keeps the sort stable for tied counts.
        let mut ordered: Vec<(String, u64)> = Vec::new();
        for event in requests.iter() {
            match ordered
                .iter_mut()
                .find(|(name, _)| *name == event.device_name)
            {
                Some((_, count)) => *count += 1,
                None => ordered.push((event.device_name.clone(), 1)),
            }
        }
        ordered.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(ordered.into_iter().take(n).map(|(name, _)| name).collect())
    }

    async fn most_requested_pair(&self) -> Result<Option<ConversionPair>, GatewayError> {
        let pairs = self.pairs.read().await;
        Ok(pairs
            .iter()
            .max_by(|a, b| {
                a.1.count
                    .cmp(&b.1.count)
                    .then(b.1.first_seen.cmp(&a.1.first_seen))
            })
            .map(|((from, to), cell)| ConversionPair {
                from_currency: from.clone(),
                to_currency: to.clone(),
                count: cell.count,
            }))
    }

    async fn average_response_time(&self) -> Result<Option<f64>, GatewayError> {
        let responses = self.service_responses.read().await;
        if responses.is_empty() {
            return Ok(None);
        }
        let sum: u64 = responses.iter().map(|r| r.response_time_ms).sum();
        Ok(Some(sum as f64 / responses.len() as f64))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::telemetry::events::{ConversionIntent, ResponseData};

    fn client_request(device: &str) -> ClientRequestEvent {
        ClientRequestEvent {
            endpoint: "/api/v1/rates/latest".to_string(),
            http_method: "GET".to_string(),
            device_name: device.to_string(),
            operating_system: "Android".to_string(),
            ip_address: "10.0.0.1".to_string(),
            request: ConversionIntent::default(),
        }
    }

    fn service_response(elapsed_ms: u64) -> ServiceResponseEvent {
        ServiceResponseEvent {
            response_time_ms: elapsed_ms,
            status_code: 200,
            request_type: "getRate".to_string(),
            data: ResponseData::default(),
        }
    }

    #[tokio::test]
    async fn top_devices_orders_by_count_descending() {
        let store = MemoryEventStore::new();
        for device in ["A", "A", "B", "C", "C", "C"] {
            let result = store.insert_client_request(client_request(device)).await;
            assert!(result.is_ok());
        }

        let Ok(top) = store.top_devices(5).await else {
            panic!("aggregation failed");
        };
        assert_eq!(top, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn top_devices_truncates_to_n() {
        let store = MemoryEventStore::new();
        for device in ["A", "B", "C", "D"] {
            let result = store.insert_client_request(client_request(device)).await;
            assert!(result.is_ok());
        }

        let Ok(top) = store.top_devices(2).await else {
            panic!("aggregation failed");
        };
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn pair_counter_is_monotonic() {
        let store = MemoryEventStore::new();
        for _ in 0..3 {
            let result = store.increment_pair("EUR", "USD").await;
            assert!(result.is_ok());
        }
        let result = store.increment_pair("GBP", "JPY").await;
        assert!(result.is_ok());

        let Ok(Some(top)) = store.most_requested_pair().await else {
            panic!("expected a top pair");
        };
        assert_eq!(top.from_currency, "EUR");
        assert_eq!(top.to_currency, "USD");
        assert_eq!(top.count, 3);
    }

    #[tokio::test]
    async fn most_requested_pair_on_empty_table_is_none() {
        let store = MemoryEventStore::new();
        let Ok(top) = store.most_requested_pair().await else {
            panic!("aggregation failed");
        };
        assert!(top.is_none());
    }

    #[tokio::test]
    async fn pair_tie_break_is_first_created() {
        let store = MemoryEventStore::new();
        let r1 = store.increment_pair("EUR", "USD").await;
        let r2 = store.increment_pair("GBP", "JPY").await;
        assert!(r1.is_ok() && r2.is_ok());

        let Ok(Some(top)) = store.most_requested_pair().await else {
            panic!("expected a top pair");
        };
        assert_eq!(top.from_currency, "EUR");
    }

    #[tokio::test]
    async fn average_over_zero_rows_is_none() {
        let store = MemoryEventStore::new();
        let Ok(avg) = store.average_response_time().await else {
            panic!("aggregation failed");
        };
        assert!(avg.is_none());
    }

    #[tokio::test]
    async fn average_is_arithmetic_mean() {
        let store = MemoryEventStore::new();
        for elapsed in [10, 20, 30] {
            let result = store.insert_service_response(service_response(elapsed)).await;
            assert!(result.is_ok());
        }

        let Ok(Some(avg)) = store.average_response_time().await else {
            panic!("expected an average");
        };
        assert!((avg - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_counts() {
        let store = std::sync::Arc::new(MemoryEventStore::new());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_pair("EUR", "USD").await
            }));
        }
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            assert!(result.is_ok());
        }

        let Ok(Some(top)) = store.most_requested_pair().await else {
            panic!("expected a top pair");
        };
        assert_eq!(top.count, 20);
    }
}
