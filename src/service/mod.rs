//! Service layer: conversion orchestration and dashboard aggregation.

pub mod conversion;
pub mod metrics;

pub use conversion::ConversionService;
pub use metrics::MetricsService;
