//! PostgreSQL implementation of the event store.
//!
//! Five tables back the four event streams and the pair counter (see
//! `migrations/`). Nested `request_data`/`response_data` records are kept
//! as JSONB so additive fields stay forward-compatible, and the pair
//! counter uses `ON CONFLICT … DO UPDATE` so concurrent increments for the
//! same pair never race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::EventStore;
use crate::error::GatewayError;
use crate::telemetry::events::{
    ClientRequestEvent, ConversionIntent, ConversionPair, EndpointKind, ResponseData,
    ServerRequestEvent, ServerResponseEvent, ServiceResponseEvent,
};

/// PostgreSQL-backed event store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn persistence_err(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Persistence(e.to_string())
}

fn endpoint_kind(tag: &str) -> Result<EndpointKind, GatewayError> {
    match tag {
        "latest" => Ok(EndpointKind::Latest),
        "historical" => Ok(EndpointKind::Historical),
        other => Err(GatewayError::Persistence(format!(
            "unknown endpoint tag in server_request row: {other}"
        ))),
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn insert_client_request(&self, event: ClientRequestEvent) -> Result<(), GatewayError> {
        let request_data = serde_json::to_value(&event.request).map_err(persistence_err)?;
        sqlx::query(
            "INSERT INTO client_request \
             (endpoint, http_method, device_name, operating_system, ip_address, request_data) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&event.endpoint)
        .bind(&event.http_method)
        .bind(&event.device_name)
        .bind(&event.operating_system)
        .bind(&event.ip_address)
        .bind(request_data)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn insert_server_request(&self, event: ServerRequestEvent) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO server_request \
             (http_method, endpoint, requested_at, date, to_date, from_currency, to_currency, ip_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&event.http_method)
        .bind(event.endpoint.as_str())
        .bind(event.timestamp)
        .bind(&event.date)
        .bind(&event.to_date)
        .bind(&event.from_currency)
        .bind(&event.to_currency)
        .bind(&event.ip_address)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn insert_server_response(&self, event: ServerResponseEvent) -> Result<(), GatewayError> {
        let response_data = serde_json::to_value(&event.data).map_err(persistence_err)?;
        sqlx::query(
            "INSERT INTO server_response \
             (response_time_ms, status_code, payload_bytes, response_data) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(clamp_i64(event.response_time_ms))
        .bind(i32::from(event.status_code))
        .bind(clamp_i64(event.payload_bytes))
        .bind(response_data)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn insert_service_response(
        &self,
        event: ServiceResponseEvent,
    ) -> Result<(), GatewayError> {
        let response_data = serde_json::to_value(&event.data).map_err(persistence_err)?;
        sqlx::query(
            "INSERT INTO service_response \
             (response_time_ms, status_code, request_type, response_data) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(clamp_i64(event.response_time_ms))
        .bind(i32::from(event.status_code))
        .bind(&event.request_type)
        .bind(response_data)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn increment_pair(&self, from: &str, to: &str) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO conversion_requests (from_currency, to_currency, count) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (from_currency, to_currency) \
             DO UPDATE SET count = conversion_requests.count + 1",
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn client_requests(&self) -> Result<Vec<ClientRequestEvent>, GatewayError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, serde_json::Value)>(
            "SELECT endpoint, http_method, device_name, operating_system, ip_address, request_data \
             FROM client_request ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        rows.into_iter()
            .map(
                |(endpoint, http_method, device_name, operating_system, ip_address, request_data)| {
                    let request: ConversionIntent =
                        serde_json::from_value(request_data).map_err(persistence_err)?;
                    Ok(ClientRequestEvent {
                        endpoint,
                        http_method,
                        device_name,
                        operating_system,
                        ip_address,
                        request,
                    })
                },
            )
            .collect()
    }

    async fn server_requests(&self) -> Result<Vec<ServerRequestEvent>, GatewayError> {
        type Row = (
            String,
            String,
            DateTime<Utc>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
        );
        let rows = sqlx::query_as::<_, Row>(
            "SELECT http_method, endpoint, requested_at, date, to_date, \
             from_currency, to_currency, ip_address \
             FROM server_request ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        rows.into_iter()
            .map(
                |(http_method, endpoint, timestamp, date, to_date, from_currency, to_currency, ip_address)| {
                    Ok(ServerRequestEvent {
                        http_method,
                        endpoint: endpoint_kind(&endpoint)?,
                        timestamp,
                        date,
                        to_date,
                        from_currency,
                        to_currency,
                        ip_address,
                    })
                },
            )
            .collect()
    }

    async fn server_responses(&self) -> Result<Vec<ServerResponseEvent>, GatewayError> {
        let rows = sqlx::query_as::<_, (i64, i32, i64, serde_json::Value)>(
            "SELECT response_time_ms, status_code, payload_bytes, response_data \
             FROM server_response ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        rows.into_iter()
            .map(|(response_time_ms, status_code, payload_bytes, response_data)| {
                let data: ResponseData =
                    serde_json::from_value(response_data).map_err(persistence_err)?;
                Ok(ServerResponseEvent {
                    response_time_ms: u64::try_from(response_time_ms).unwrap_or(0),
                    status_code: u16::try_from(status_code).unwrap_or(0),
                    payload_bytes: u64::try_from(payload_bytes).unwrap_or(0),
                    data,
                })
            })
            .collect()
    }

    async fn service_responses(&self) -> Result<Vec<ServiceResponseEvent>, GatewayError> {
        let rows = sqlx::query_as::<_, (i64, i32, String, serde_json::Value)>(
            "SELECT response_time_ms, status_code, request_type, response_data \
             FROM service_response ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        rows.into_iter()
            .map(|(response_time_ms, status_code, request_type, response_data)| {
                let data: ResponseData =
                    serde_json::from_value(response_data).map_err(persistence_err)?;
                Ok(ServiceResponseEvent {
                    response_time_ms: u64::try_from(response_time_ms).unwrap_or(0),
                    status_code: u16::try_from(status_code).unwrap_or(0),
                    request_type,
                    data,
                })
            })
            .collect()
    }

    async fn top_devices(&self, n: usize) -> Result<Vec<String>, GatewayError> {
        // MIN(id) as the secondary key keeps tied counts in first-seen order.
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT device_name FROM client_request \
             GROUP BY device_name \
             ORDER BY COUNT(*) DESC, MIN(id) ASC \
             LIMIT $1",
        )
        .bind(clamp_i64(n as u64))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(rows)
    }

    async fn most_requested_pair(&self) -> Result<Option<ConversionPair>, GatewayError> {
        let row = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT from_currency, to_currency, count FROM conversion_requests \
             ORDER BY count DESC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(|(from_currency, to_currency, count)| ConversionPair {
            from_currency,
            to_currency,
            count: u64::try_from(count).unwrap_or(0),
        }))
    }

    async fn average_response_time(&self) -> Result<Option<f64>, GatewayError> {
        // AVG over zero rows is SQL NULL, which maps to None here.
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(response_time_ms)::DOUBLE PRECISION FROM service_response",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(avg)
    }
}
