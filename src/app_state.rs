//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{ConversionService, MetricsService};
use crate::store::EventStore;
use crate::telemetry::TelemetryIngestor;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Conversion orchestrator over the upstream provider.
    pub conversion: Arc<ConversionService>,
    /// Read-side aggregation for the dashboard.
    pub metrics: MetricsService,
    /// Fire-and-forget telemetry handle.
    pub ingestor: TelemetryIngestor,
    /// Event store, for the raw dashboard listings.
    pub store: Arc<dyn EventStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conversion", &self.conversion)
            .field("metrics", &self.metrics)
            .field("ingestor", &self.ingestor)
            .finish_non_exhaustive()
    }
}
