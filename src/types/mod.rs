//! Shared type definitions.

pub mod usage_metrics;

pub use usage_metrics::UsageMetrics;
