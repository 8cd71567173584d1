//! Request pipeline: retrieval, cache, analysis and presentation wired
//! together for one location at a time.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{Alert, generate_alerts};
use crate::cache::{CacheKey, CacheStore, CachedSeries, WeatherCache};
use crate::config::AppConfig;
use crate::location_resolver::LocationResolver;
use crate::models::{Location, Variable, WeatherRecord};
use crate::presentation::{
    ChartArtifact, ChartKind, MapArtifact, Report, ReportKind, build_report_with_thresholds,
    render_chart, render_map, to_csv, to_spreadsheet,
};
use crate::weather::{Mode, WeatherSource};
use crate::{Result, WeatherError};

/// Days of history behind a climate report
pub const CLIMATE_WINDOW_DAYS: u32 = 365;

/// Current conditions at one location of a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSnapshot {
    pub location: Location,
    pub record: Option<WeatherRecord>,
    pub stale: bool,
    pub error: Option<String>,
}

/// Which series an export or chart request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRequest {
    Current,
    Forecast { days: Option<u32> },
    Historical { start: Option<NaiveDate>, end: Option<NaiveDate> },
}

pub struct WeatherService<W, S> {
    source: W,
    cache: WeatherCache<S>,
    config: AppConfig,
}

impl<W: WeatherSource, S: CacheStore> WeatherService<W, S> {
    pub fn new(source: W, cache: WeatherCache<S>, config: AppConfig) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Preset locations from configuration
    #[must_use]
    pub fn presets(&self) -> Vec<Location> {
        self.config
            .defaults
            .locations
            .iter()
            .map(Location::from)
            .collect()
    }

    #[must_use]
    pub fn default_location(&self) -> Location {
        Location::from(&self.config.weather.default_location)
    }

    /// Resolve user input to a location. No input means the default location.
    pub async fn resolve(&self, input: Option<&str>) -> Result<Location> {
        match input.map(str::trim).filter(|s| !s.is_empty()) {
            Some(input) => LocationResolver::resolve(&self.source, &self.presets(), input).await,
            None => Ok(self.default_location()),
        }
    }

    #[tracing::instrument(skip(self, location, mode), fields(location = %location.id(), mode = %mode.label()))]
    async fn series(&self, location: &Location, mode: Mode) -> Result<CachedSeries> {
        location.validate()?;
        let key = CacheKey::new(location, mode);
        let series = self
            .cache
            .get_or_fetch(&key, || self.source.fetch_raw(location, mode))
            .await?;
        if series.stale {
            warn!(fetched_at = %series.fetched_at, "Serving stale data");
        }
        info!(records = series.records.len(), "Series ready");
        Ok(series)
    }

    pub async fn current(&self, location: &Location) -> Result<CachedSeries> {
        self.series(location, Mode::Current).await
    }

    /// Daily forecast, falling back to the configured length
    pub async fn forecast(&self, location: &Location, days: Option<u32>) -> Result<CachedSeries> {
        let days = days.unwrap_or(self.config.defaults.forecast_days);
        self.series(location, Mode::forecast(days)).await
    }

    /// Daily history. Missing bounds default to a window ending yesterday.
    pub async fn historical(
        &self,
        location: &Location,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<CachedSeries> {
        let (start, end) = self.history_window(start, end, self.config.defaults.history_days);
        self.series(location, Mode::historical(start, end)?).await
    }

    fn history_window(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: u32,
    ) -> (NaiveDate, NaiveDate) {
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let end = end.unwrap_or(yesterday);
        let start =
            start.unwrap_or_else(|| end - Duration::days(i64::from(days.saturating_sub(1))));
        (start, end)
    }

    pub async fn fetch(&self, location: &Location, request: SeriesRequest) -> Result<CachedSeries> {
        match request {
            SeriesRequest::Current => self.current(location).await,
            SeriesRequest::Forecast { days } => self.forecast(location, days).await,
            SeriesRequest::Historical { start, end } => {
                self.historical(location, start, end).await
            }
        }
    }

    /// Current conditions for several locations, one after another. A
    /// failing location is reported in its snapshot rather than failing
    /// the whole comparison.
    #[tracing::instrument(skip_all, fields(count = locations.len()))]
    pub async fn compare(&self, locations: &[Location]) -> Result<Vec<LocationSnapshot>> {
        if locations.is_empty() {
            return Err(WeatherError::validation("no locations to compare"));
        }

        let mut snapshots = Vec::with_capacity(locations.len());
        for location in locations {
            let snapshot = match self.current(location).await {
                Ok(series) => LocationSnapshot {
                    location: location.clone(),
                    record: series.records.last().cloned(),
                    stale: series.stale,
                    error: None,
                },
                Err(err) => {
                    warn!(location = %location.name, error = %err, "Comparison entry failed");
                    LocationSnapshot {
                        location: location.clone(),
                        record: None,
                        stale: false,
                        error: Some(err.user_message()),
                    }
                }
            };
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    /// Alerts for a series using the configured thresholds
    #[must_use]
    pub fn alerts(&self, records: &[WeatherRecord]) -> Vec<Alert> {
        generate_alerts(records, &self.config.alerts)
    }

    /// Daily reports use current conditions, weekly ones the forecast,
    /// monthly and climate reports history.
    #[tracing::instrument(skip(self, location), fields(location = %location.id()))]
    pub async fn report(&self, kind: ReportKind, location: &Location) -> Result<Report> {
        let series = match kind {
            ReportKind::Daily => self.current(location).await?,
            ReportKind::Weekly => self.forecast(location, Some(7)).await?,
            ReportKind::Monthly => self.historical(location, None, None).await?,
            ReportKind::Climate => {
                let (start, end) = self.history_window(None, None, CLIMATE_WINDOW_DAYS);
                self.series(location, Mode::historical(start, end)?).await?
            }
        };
        let alerts = self.alerts(&series.records);
        build_report_with_thresholds(
            kind,
            location,
            &series.records,
            &alerts,
            &self.config.alerts,
        )
    }

    /// Chart a series. Series charts draw the temperature column unless
    /// `variable` picks another one.
    pub async fn chart(
        &self,
        location: &Location,
        request: SeriesRequest,
        kind: ChartKind,
        variable: Option<Variable>,
    ) -> Result<ChartArtifact> {
        let series = self.fetch(location, request).await?;
        render_chart(&series.records, kind, variable)
    }

    /// Map of the given locations with their current conditions
    pub async fn map(&self, locations: &[Location]) -> Result<MapArtifact> {
        let snapshots = self.compare(locations).await?;
        let records: Vec<WeatherRecord> =
            snapshots.into_iter().filter_map(|s| s.record).collect();
        render_map(locations, &records)
    }

    pub async fn export_csv(&self, location: &Location, request: SeriesRequest) -> Result<String> {
        let series = self.fetch(location, request).await?;
        to_csv(&series.records)
    }

    pub async fn export_spreadsheet(
        &self,
        location: &Location,
        request: SeriesRequest,
    ) -> Result<Vec<u8>> {
        let series = self.fetch(location, request).await?;
        to_spreadsheet(&series.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AlertThresholds;
    use crate::cache::{FreshnessPolicy, MemoryStore};
    use crate::weather::RawSeries;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CannedSource {
        calls: AtomicUsize,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl WeatherSource for CannedSource {
        async fn fetch_raw(&self, location: &Location, mode: Mode) -> Result<RawSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.as_deref() == Some(location.name.as_str()) {
                return Err(WeatherError::network("connection refused"));
            }
            let raw = RawSeries::new(location.clone());
            Ok(match mode {
                Mode::Current => {
                    let mut raw = raw
                        .with_column("temperature_2m", "°C", vec![Some(31.0)])
                        .with_column("precipitation", "mm", vec![Some(0.0)])
                        .with_column("wind_speed_10m", "km/h", vec![Some(12.0)]);
                    raw.time = vec!["2024-06-01T12:00".to_string()];
                    raw
                }
                _ => {
                    let mut raw = raw
                        .with_column("temperature_2m_max", "°C", vec![Some(36.0), Some(33.0)])
                        .with_column("precipitation_sum", "mm", vec![Some(60.0), None]);
                    raw.time = vec!["2024-06-01".to_string(), "2024-06-02".to_string()];
                    raw
                }
            })
        }

        async fn geocode(&self, name: &str) -> Result<Vec<Location>> {
            Ok(vec![Location::new(12.2388, 109.1967, name)])
        }
    }

    fn service(source: CannedSource) -> WeatherService<CannedSource, MemoryStore> {
        let cache = WeatherCache::new(MemoryStore::new(), FreshnessPolicy::default());
        WeatherService::new(source, cache, AppConfig::default())
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let service = service(CannedSource::default());
        let location = service.default_location();

        let first = service.forecast(&location, Some(2)).await.unwrap();
        let second = service.forecast(&location, Some(2)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.records.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_defaults_and_geocodes() {
        let service = service(CannedSource::default());
        assert_eq!(service.resolve(None).await.unwrap().name, "Hà Nội");
        assert_eq!(service.resolve(Some("  ")).await.unwrap().name, "Hà Nội");
        assert_eq!(
            service.resolve(Some("Nha Trang")).await.unwrap().latitude,
            12.2388
        );
    }

    #[tokio::test]
    async fn test_compare_keeps_going_past_a_failure() {
        let service = service(CannedSource {
            fail_for: Some("Huế".to_string()),
            ..CannedSource::default()
        });
        let presets = service.presets();

        let snapshots = service.compare(&presets).await.unwrap();

        assert_eq!(snapshots.len(), presets.len());
        let failed: Vec<_> = snapshots.iter().filter(|s| s.error.is_some()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].location.name, "Huế");
        assert!(snapshots
            .iter()
            .filter(|s| s.error.is_none())
            .all(|s| s.record.as_ref().and_then(|r| r.get(Variable::Temperature)) == Some(31.0)));
    }

    #[tokio::test]
    async fn test_compare_needs_locations() {
        let service = service(CannedSource::default());
        assert!(matches!(
            service.compare(&[]).await,
            Err(WeatherError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_alerts_use_configured_thresholds() {
        let service = service(CannedSource::default());
        let location = service.default_location();
        let series = service.forecast(&location, Some(2)).await.unwrap();

        let alerts = service.alerts(&series.records);

        // 36 °C heat and 60 mm rain on the first day only
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.record.timestamp == series.records[0].timestamp));
    }

    #[tokio::test]
    async fn test_weekly_report_and_exports() {
        let service = service(CannedSource::default());
        let location = service.default_location();

        let report = service.report(ReportKind::Weekly, &location).await.unwrap();
        assert_eq!(report.sections[0].heading, "Overview");
        assert!(report.sections.iter().any(|s| s.heading == "Alerts"));

        let csv = service
            .export_csv(&location, SeriesRequest::Forecast { days: Some(2) })
            .await
            .unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_report_summary_uses_configured_thresholds() {
        let mut config = AppConfig::default();
        config.alerts = AlertThresholds {
            heat: 40.0,
            rain: 100.0,
            wind: 100.0,
        };
        let cache = WeatherCache::new(MemoryStore::new(), FreshnessPolicy::default());
        let service = WeatherService::new(CannedSource::default(), cache, config);
        let location = service.default_location();

        let report = service.report(ReportKind::Weekly, &location).await.unwrap();

        assert!(!report.sections.iter().any(|s| s.heading == "Alerts"));
        let summary = report
            .sections
            .iter()
            .find(|s| s.heading == "Summary")
            .unwrap();
        assert!(!summary.body.contains("Attention"));
    }

    #[tokio::test]
    async fn test_historical_rejects_reversed_range() {
        let service = service(CannedSource::default());
        let location = service.default_location();
        let start = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let err = service
            .historical(&location, Some(start), Some(end))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Validation { .. }));
        assert_eq!(service.source.calls.load(Ordering::SeqCst), 0);
    }
}
