//! Asynchronous telemetry ingestion.
//!
//! [`TelemetryIngestor`] is a cheap clonable handle over a bounded
//! [`tokio::sync::mpsc`] channel consumed by a small pool of writer tasks.
//! Every ingest call enqueues one job and returns immediately; jobs commit
//! at-most-once, in no particular order, and a failed write is logged and
//! swallowed. The bounded queue gives backpressure control: when it is
//! full the event is dropped, not the request.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::agent::UserAgentParser;
use super::events::{
    ClientRequestEvent, ConversionIntent, EndpointKind, ResponseData, ServerRequestEvent,
    ServerResponseEvent, ServicePayload, ServiceResponseEvent,
};
use crate::store::EventStore;
use crate::upstream::CallMeta;

/// Raw metadata of one inbound API call, captured before ingestion.
#[derive(Debug, Clone)]
pub struct ClientRequestMeta {
    /// Request path.
    pub endpoint: String,
    /// HTTP method.
    pub http_method: String,
    /// Raw `User-Agent` header value (empty when absent).
    pub user_agent: String,
    /// Source IP of the caller.
    pub ip_address: String,
    /// Conversion parameters from the query string.
    pub intent: ConversionIntent,
}

/// One unit of background write work.
#[derive(Debug)]
enum IngestJob {
    ClientRequest(ClientRequestMeta),
    ServiceResponse {
        elapsed_ms: u64,
        status_code: u16,
        payload: ServicePayload,
    },
    ServerExchange {
        request: ServerRequestEvent,
        response: ServerResponseEvent,
    },
}

/// Handle for enqueueing telemetry work. Clone freely; all clones feed
/// the same writer pool.
#[derive(Debug, Clone)]
pub struct TelemetryIngestor {
    tx: mpsc::Sender<IngestJob>,
    source_ip: Arc<str>,
}

/// Join handles of the writer pool. Await via [`IngestWorkers::join`]
/// after every [`TelemetryIngestor`] clone has been dropped to drain the
/// queue (graceful shutdown, deterministic tests).
#[derive(Debug)]
pub struct IngestWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl IngestWorkers {
    /// Waits for all writer tasks to finish draining the queue.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "ingest worker terminated abnormally");
            }
        }
    }
}

impl TelemetryIngestor {
    /// Starts the writer pool and returns the enqueue handle.
    ///
    /// `capacity` bounds the job queue; `workers` tasks drain it
    /// concurrently. `source_ip` is recorded on outbound-exchange rows as
    /// the address this gateway calls the provider from.
    #[must_use]
    pub fn spawn(
        store: Arc<dyn EventStore>,
        parser: Arc<dyn UserAgentParser>,
        capacity: usize,
        workers: usize,
        source_ip: &str,
    ) -> (Self, IngestWorkers) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|_| {
                let store = Arc::clone(&store);
                let parser = Arc::clone(&parser);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => run_job(store.as_ref(), parser.as_ref(), job).await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        (
            Self {
                tx,
                source_ip: Arc::from(source_ip),
            },
            IngestWorkers { handles },
        )
    }

    /// Records an inbound client request. Never fails: telemetry loss is
    /// not a caller-visible condition.
    pub fn ingest_client_request(&self, meta: ClientRequestMeta) {
        self.enqueue(IngestJob::ClientRequest(meta));
    }

    /// Records a response this gateway returned to its caller. The
    /// payload's request type determines the derived metrics; an unknown
    /// tag produces a zeroed record rather than an error.
    pub fn ingest_service_response(
        &self,
        elapsed_ms: u64,
        status_code: u16,
        payload: ServicePayload,
    ) {
        self.enqueue(IngestJob::ServiceResponse {
            elapsed_ms,
            status_code,
            payload,
        });
    }

    /// Records one outbound provider exchange: the request that was
    /// dispatched and the response (or failed attempt) that came back.
    pub fn ingest_server_exchange(
        &self,
        method: &str,
        kind: EndpointKind,
        meta: CallMeta,
        intent: ConversionIntent,
        data: ResponseData,
    ) {
        let request = ServerRequestEvent {
            http_method: method.to_string(),
            endpoint: kind,
            timestamp: Utc::now(),
            date: intent.date,
            to_date: intent.to_date,
            from_currency: intent.from_currency,
            to_currency: intent.to_currency,
            ip_address: self.source_ip.to_string(),
        };
        let response = ServerResponseEvent {
            response_time_ms: meta.elapsed_ms,
            status_code: meta.status,
            payload_bytes: meta.body_bytes,
            data,
        };
        self.enqueue(IngestJob::ServerExchange { request, response });
    }

    fn enqueue(&self, job: IngestJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("telemetry queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("telemetry workers stopped, dropping event");
            }
        }
    }
}

async fn run_job(store: &dyn EventStore, parser: &dyn UserAgentParser, job: IngestJob) {
    match job {
        IngestJob::ClientRequest(meta) => {
            if let (Some(from), Some(to)) = (
                meta.intent.from_currency.as_deref(),
                meta.intent.to_currency.as_deref(),
            ) {
                if let Err(e) = store.increment_pair(from, to).await {
                    tracing::warn!(error = %e, "telemetry write failed: pair counter");
                }
            }

            let device = parser.parse(&meta.user_agent);
            let event = ClientRequestEvent {
                endpoint: meta.endpoint,
                http_method: meta.http_method,
                device_name: device.device_name,
                operating_system: device.operating_system,
                ip_address: meta.ip_address,
                request: meta.intent,
            };
            if let Err(e) = store.insert_client_request(event).await {
                tracing::warn!(error = %e, "telemetry write failed: client request");
            }
        }
        IngestJob::ServiceResponse {
            elapsed_ms,
            status_code,
            payload,
        } => {
            let event = ServiceResponseEvent {
                response_time_ms: elapsed_ms,
                status_code,
                request_type: payload.kind_tag().to_string(),
                data: payload.response_data(),
            };
            if let Err(e) = store.insert_service_response(event).await {
                tracing::warn!(error = %e, "telemetry write failed: service response");
            }
        }
        IngestJob::ServerExchange { request, response } => {
            if let Err(e) = store.insert_server_request(request).await {
                tracing::warn!(error = %e, "telemetry write failed: server request");
            }
            if let Err(e) = store.insert_server_response(response).await {
                tracing::warn!(error = %e, "telemetry write failed: server response");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::store::MemoryEventStore;
    use crate::telemetry::agent::BestEffortParser;
    use crate::telemetry::events::ConversionPair;
    use async_trait::async_trait;

    /// Store that fails every operation, for the loss-is-silent contract.
    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl EventStore for FailingStore {
        async fn insert_client_request(&self, _: ClientRequestEvent) -> Result<(), GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn insert_server_request(&self, _: ServerRequestEvent) -> Result<(), GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn insert_server_response(&self, _: ServerResponseEvent) -> Result<(), GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn insert_service_response(
            &self,
            _: ServiceResponseEvent,
        ) -> Result<(), GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn increment_pair(&self, _: &str, _: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn client_requests(&self) -> Result<Vec<ClientRequestEvent>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn server_requests(&self) -> Result<Vec<ServerRequestEvent>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn server_responses(&self) -> Result<Vec<ServerResponseEvent>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn service_responses(&self) -> Result<Vec<ServiceResponseEvent>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn top_devices(&self, _: usize) -> Result<Vec<String>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn most_requested_pair(&self) -> Result<Option<ConversionPair>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
        async fn average_response_time(&self) -> Result<Option<f64>, GatewayError> {
            Err(GatewayError::Persistence("disk on fire".to_string()))
        }
    }

    fn pair_intent(from: &str, to: &str) -> ConversionIntent {
        ConversionIntent {
            from_currency: Some(from.to_string()),
            to_currency: Some(to.to_string()),
            date: None,
            to_date: None,
        }
    }

    fn client_meta(intent: ConversionIntent) -> ClientRequestMeta {
        ClientRequestMeta {
            endpoint: "/api/v1/rates/latest".to_string(),
            http_method: "GET".to_string(),
            user_agent: "Mozilla/5.0 (Linux; Android 13; Pixel 7) Mobile".to_string(),
            ip_address: "10.1.2.3".to_string(),
            intent,
        }
    }

    fn spawn_with(store: Arc<dyn EventStore>) -> (TelemetryIngestor, IngestWorkers) {
        TelemetryIngestor::spawn(store, Arc::new(BestEffortParser), 64, 2, "127.0.0.1")
    }

    #[tokio::test]
    async fn client_request_writes_event_and_counter() {
        let store = Arc::new(MemoryEventStore::new());
        let (ingestor, workers) = spawn_with(Arc::clone(&store) as Arc<dyn EventStore>);

        ingestor.ingest_client_request(client_meta(pair_intent("EUR", "USD")));
        ingestor.ingest_client_request(client_meta(pair_intent("EUR", "USD")));
        drop(ingestor);
        workers.join().await;

        let Ok(requests) = store.client_requests().await else {
            panic!("read failed");
        };
        assert_eq!(requests.len(), 2);
        let Some(first) = requests.first() else {
            panic!("missing event");
        };
        assert_eq!(first.device_name, "Pixel 7");
        assert_eq!(first.operating_system, "Android");

        let Ok(Some(pair)) = store.most_requested_pair().await else {
            panic!("expected counter row");
        };
        assert_eq!(pair.count, 2);
    }

    #[tokio::test]
    async fn listing_request_does_not_touch_counter() {
        let store = Arc::new(MemoryEventStore::new());
        let (ingestor, workers) = spawn_with(Arc::clone(&store) as Arc<dyn EventStore>);

        ingestor.ingest_client_request(client_meta(ConversionIntent::default()));
        drop(ingestor);
        workers.join().await;

        let Ok(pair) = store.most_requested_pair().await else {
            panic!("read failed");
        };
        assert!(pair.is_none());
    }

    #[tokio::test]
    async fn store_failure_never_reaches_the_caller() {
        let (ingestor, workers) = spawn_with(Arc::new(FailingStore));

        // All three ingest paths against a store that always fails; the
        // calls themselves must stay infallible.
        ingestor.ingest_client_request(client_meta(pair_intent("EUR", "USD")));
        ingestor.ingest_service_response(
            12,
            200,
            ServicePayload::Rate {
                currency: "USD".to_string(),
                rate: 1.1,
            },
        );
        ingestor.ingest_server_exchange(
            "GET",
            EndpointKind::Latest,
            CallMeta {
                status: 200,
                elapsed_ms: 40,
                body_bytes: 128,
            },
            pair_intent("EUR", "USD"),
            ResponseData::default(),
        );
        drop(ingestor);
        workers.join().await;
    }

    #[tokio::test]
    async fn service_response_derives_currency_listing() {
        let store = Arc::new(MemoryEventStore::new());
        let (ingestor, workers) = spawn_with(Arc::clone(&store) as Arc<dyn EventStore>);

        let currencies: Vec<String> = ["EUR", "USD", "GBP", "JPY", "CHF", "AUD", "CAD"]
            .iter()
            .map(ToString::to_string)
            .collect();
        ingestor.ingest_service_response(8, 200, ServicePayload::Currencies { currencies });
        drop(ingestor);
        workers.join().await;

        let Ok(responses) = store.service_responses().await else {
            panic!("read failed");
        };
        let Some(event) = responses.first() else {
            panic!("missing event");
        };
        assert_eq!(event.request_type, "getCurrencies");
        let Some(listed) = &event.data.to_currencies else {
            panic!("currencies list must be populated");
        };
        assert_eq!(listed.len(), 7);
        assert!(event.data.to_currency_values.is_none());
    }

    #[tokio::test]
    async fn unknown_tag_writes_zeroed_record() {
        let store = Arc::new(MemoryEventStore::new());
        let (ingestor, workers) = spawn_with(Arc::clone(&store) as Arc<dyn EventStore>);

        let payload = ServicePayload::from_tag("bulkExport", &serde_json::json!([1, 2]));
        ingestor.ingest_service_response(5, 200, payload);
        drop(ingestor);
        workers.join().await;

        let Ok(responses) = store.service_responses().await else {
            panic!("read failed");
        };
        let Some(event) = responses.first() else {
            panic!("missing event");
        };
        assert_eq!(event.request_type, "unknown");
        assert_eq!(event.data, ResponseData::default());
    }

    #[tokio::test]
    async fn server_exchange_writes_request_and_response_pair() {
        let store = Arc::new(MemoryEventStore::new());
        let (ingestor, workers) = spawn_with(Arc::clone(&store) as Arc<dyn EventStore>);

        ingestor.ingest_server_exchange(
            "GET",
            EndpointKind::Historical,
            CallMeta {
                status: 200,
                elapsed_ms: 73,
                body_bytes: 512,
            },
            ConversionIntent {
                from_currency: Some("EUR".to_string()),
                to_currency: Some("USD".to_string()),
                date: Some("2020-01-01".to_string()),
                to_date: None,
            },
            ResponseData {
                rate_count: 1,
                average_rate: 1.1,
                ..ResponseData::default()
            },
        );
        drop(ingestor);
        workers.join().await;

        let Ok(requests) = store.server_requests().await else {
            panic!("read failed");
        };
        let Ok(responses) = store.server_responses().await else {
            panic!("read failed");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(responses.len(), 1);
        let Some(request) = requests.first() else {
            panic!("missing request");
        };
        assert_eq!(request.endpoint, EndpointKind::Historical);
        assert_eq!(request.ip_address, "127.0.0.1");
        let Some(response) = responses.first() else {
            panic!("missing response");
        };
        assert_eq!(response.response_time_ms, 73);
        assert_eq!(response.payload_bytes, 512);
    }
}
