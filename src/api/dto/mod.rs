//! Request and response DTOs for the REST surface.

pub mod dashboard_dto;
pub mod rates_dto;

pub use dashboard_dto::{ConversionPairDto, DashboardMetricsResponse};
pub use rates_dto::{
    CurrencyListResponse, HistoricalResponse, PairQuery, PairRateResponse, RateQuery,
    SeriesPointDto, SeriesQuery,
};
