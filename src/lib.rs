//! # fx-gateway
//!
//! REST gateway over an upstream currency exchange-rate provider, with a
//! request/response telemetry pipeline and dashboard aggregation.
//!
//! Conversion requests are proxied synchronously to the provider; every
//! inbound client request, outbound provider exchange, and service
//! response is recorded as a structured event on a fire-and-forget
//! ingestion path that never blocks (or fails) the caller. The read side
//! aggregates those events into operational metrics: most-requested
//! currency pair, most common client device, mean response latency.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── ConversionService (service/) ──► RateClient (upstream/)
//!     ├── MetricsService (service/)
//!     │
//!     ├── TelemetryIngestor (telemetry/)   bounded queue + writer pool
//!     │
//!     └── EventStore (store/)              PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod upstream;
