//! Derived metrics over normalized records. Everything here is pure.

pub mod alerts;
pub mod indices;
pub mod stats;
pub mod summary;

pub use alerts::{Alert, AlertCategory, AlertThresholds, Severity, generate_alerts};
pub use indices::{compute_climate_indices, heat_index};
pub use stats::{
    Anomaly, Difference, MonthlyAggregate, Patterns, PeriodComparison, SeasonalStatistics,
    Statistics, Trend, TrendDirection, compare_periods, correlation, detect_anomalies,
    detect_patterns, monthly_aggregates, moving_average, seasonal_statistics, statistics,
    statistics_all, trend,
};
pub use summary::{describe_conditions, summarize, summarize_with_thresholds};
