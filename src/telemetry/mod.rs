//! Telemetry: event model, user-agent capability, and the asynchronous
//! ingestion pipeline.
//!
//! Ingestion is strictly fire-and-forget: the request-serving path hands a
//! job to a bounded queue and moves on. A write that fails (or a queue
//! that is full) costs a diagnostic log line, never a user-visible error.

pub mod agent;
pub mod events;
pub mod ingest;

pub use agent::{BestEffortParser, DeviceInfo, UserAgentParser};
pub use ingest::{ClientRequestMeta, IngestWorkers, TelemetryIngestor};
