//! `weatherdash` - weather dashboard backend
//!
//! Fetches current, forecast and historical weather from Open-Meteo, caches
//! it locally, derives alerts and statistics, and renders charts, maps,
//! reports and exports.

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod location_resolver;
pub mod models;
pub mod presentation;
pub mod service;
pub mod transform;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use analysis::{Alert, AlertCategory, AlertThresholds, Severity};
pub use cache::{CacheKey, CacheLookup, CacheStore, CachedSeries, FjallStore, MemoryStore, WeatherCache};
pub use config::{AppConfig, WeatherConfig};
pub use error::WeatherError;
pub use location_resolver::{LocationInput, LocationParser, LocationResolver};
pub use models::{Location, LocationId, Variable, WeatherRecord};
pub use presentation::{ChartArtifact, ChartKind, MapArtifact, Report, ReportKind};
pub use service::{SeriesRequest, WeatherService};
pub use weather::{Mode, OpenMeteoClient, RawSeries, WeatherSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
