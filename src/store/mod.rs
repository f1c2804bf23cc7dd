//! Persistence boundary for the telemetry record streams.
//!
//! [`EventStore`] covers four append-only event streams (client requests,
//! server requests, server responses, service responses) plus the mutable
//! conversion-pair counter table, and the read-side aggregations the
//! dashboard needs. Two implementations exist: [`PostgresEventStore`] for
//! durable storage and [`MemoryEventStore`] for tests and persistence-off
//! deployments.

pub mod memory;
pub mod postgres;

pub use memory::MemoryEventStore;
pub use postgres::PostgresEventStore;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::telemetry::events::{
    ClientRequestEvent, ConversionPair, ServerRequestEvent, ServerResponseEvent,
    ServiceResponseEvent,
};

/// Storage operations for telemetry events and aggregations.
///
/// Event streams are append-only; the pair counter is the single mutable
/// table and its increment is atomic (no read-then-write race under
/// concurrent requests for the same pair).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends an inbound client request record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_client_request(&self, event: ClientRequestEvent) -> Result<(), GatewayError>;

    /// Appends an outbound provider request record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_server_request(&self, event: ServerRequestEvent) -> Result<(), GatewayError>;

    /// Appends an upstream response record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_server_response(&self, event: ServerResponseEvent) -> Result<(), GatewayError>;

    /// Appends a service response record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_service_response(
        &self,
        event: ServiceResponseEvent,
    ) -> Result<(), GatewayError>;

    /// Atomically increments the counter for a conversion pair, creating
    /// the row with count 1 on first sighting.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn increment_pair(&self, from: &str, to: &str) -> Result<(), GatewayError>;

    /// Returns all recorded client requests in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn client_requests(&self) -> Result<Vec<ClientRequestEvent>, GatewayError>;

    /// Returns all recorded provider requests in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn server_requests(&self) -> Result<Vec<ServerRequestEvent>, GatewayError>;

    /// Returns all recorded upstream responses in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn server_responses(&self) -> Result<Vec<ServerResponseEvent>, GatewayError>;

    /// Returns all recorded service responses in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn service_responses(&self) -> Result<Vec<ServiceResponseEvent>, GatewayError>;

    /// Groups client requests by device name and returns the `n` most
    /// frequent device names, most requests first. Ties rank in first-seen
    /// order, so the result is stable across calls.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn top_devices(&self, n: usize) -> Result<Vec<String>, GatewayError>;

    /// Returns the conversion pair with the highest count, or `None` when
    /// the counter table is empty. Ties resolve to the first-created row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn most_requested_pair(&self) -> Result<Option<ConversionPair>, GatewayError>;

    /// Mean of `response_time_ms` over all service responses, or `None`
    /// when no rows exist. Zero rows must not report 0.0 or NaN.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn average_response_time(&self) -> Result<Option<f64>, GatewayError>;
}
