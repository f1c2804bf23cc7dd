//! Upstream rate-provider client.
//!
//! [`client::RateClient`] wraps the external exchange-rate HTTP API
//! (Frankfurter-style endpoints). It performs no persistence of its own:
//! every fetch returns [`client::CallMeta`] so the orchestration layer can
//! log the exchange, on success and on failure alike.

pub mod client;

pub use client::{
    CallMeta, FetchError, Fetched, LatestRates, PairRate, RateClient, RateSeries, SeriesPoint,
};
