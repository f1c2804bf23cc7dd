//! fx-gateway server entry point.
//!
//! Wires the event store, telemetry workers, and services together and
//! starts the Axum HTTP server. The store handle is constructed here and
//! injected into every component; no component owns a global.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fx_gateway::api;
use fx_gateway::app_state::AppState;
use fx_gateway::config::GatewayConfig;
use fx_gateway::service::{ConversionService, MetricsService};
use fx_gateway::store::{EventStore, MemoryEventStore, PostgresEventStore};
use fx_gateway::telemetry::{BestEffortParser, TelemetryIngestor};
use fx_gateway::upstream::RateClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    tracing::info!(addr = %config.listen_addr, "starting fx-gateway");

    // Build the event store: PostgreSQL when persistence is enabled,
    // otherwise process-local memory.
    let store: Arc<dyn EventStore> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("database connection failed")?;
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("database migration failed")?;
        tracing::info!("telemetry persistence: postgresql");
        Arc::new(PostgresEventStore::new(pool))
    } else {
        tracing::warn!("telemetry persistence disabled, events held in memory only");
        Arc::new(MemoryEventStore::new())
    };

    // Start the telemetry writer pool
    let (ingestor, workers) = TelemetryIngestor::spawn(
        Arc::clone(&store),
        Arc::new(BestEffortParser),
        config.ingest_queue_capacity,
        config.ingest_workers,
        &config.listen_addr.ip().to_string(),
    );

    // Build the service layer
    let rate_client = RateClient::new(
        &config.upstream_base_url,
        Duration::from_secs(config.upstream_timeout_secs),
    )
    .context("upstream client init failed")?;
    let conversion = Arc::new(ConversionService::new(rate_client, ingestor.clone()));
    let metrics = MetricsService::new(Arc::clone(&store));

    // Build application state
    let app_state = AppState {
        conversion,
        metrics,
        ingestor,
        store,
    };

    // Build router
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("bind failed")?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    // The router (and with it every ingestor clone) is gone once serve
    // returns; drain whatever telemetry is still queued.
    workers.join().await;

    Ok(())
}
