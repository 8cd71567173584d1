//! Weather retrieval: request modes, raw payloads and the source trait

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Location, Variable, WeatherRecord};
use crate::transform::{canonical_variable, normalize};
use crate::{Result, WeatherError};

pub mod open_meteo;

pub use open_meteo::OpenMeteoClient;

/// Longest forecast the API serves
pub const MAX_FORECAST_DAYS: u32 = 16;

/// Earliest day the historical archive covers
pub fn earliest_historical_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1940, 1, 1).unwrap_or(NaiveDate::MIN)
}

const CURRENT_FIELDS: &[&str] = &[
    "temperature_2m",
    "relative_humidity_2m",
    "precipitation",
    "wind_speed_10m",
    "wind_direction_10m",
    "pressure_msl",
];

const FORECAST_FIELDS: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "wind_speed_10m_max",
    "wind_direction_10m_dominant",
];

const HISTORICAL_FIELDS: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "temperature_2m_mean",
    "precipitation_sum",
    "wind_speed_10m_max",
    "wind_direction_10m_dominant",
];

/// What kind of series is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Current,
    Forecast { days: u32 },
    Historical { start: NaiveDate, end: NaiveDate },
}

impl Mode {
    /// Forecast mode with `days` clamped to `1..=16`
    #[must_use]
    pub fn forecast(days: u32) -> Self {
        Mode::Forecast {
            days: days.clamp(1, MAX_FORECAST_DAYS),
        }
    }

    /// Historical mode for a validated date range
    pub fn historical(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        validate_date_range(start, end, Utc::now().date_naive())?;
        Ok(Mode::Historical { start, end })
    }

    /// Fields requested from the API for this mode
    #[must_use]
    pub fn api_fields(&self) -> &'static [&'static str] {
        match self {
            Mode::Current => CURRENT_FIELDS,
            Mode::Forecast { .. } => FORECAST_FIELDS,
            Mode::Historical { .. } => HISTORICAL_FIELDS,
        }
    }

    /// Canonical variables every record of this mode carries
    #[must_use]
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables: Vec<Variable> = self
            .api_fields()
            .iter()
            .filter_map(|field| canonical_variable(field))
            .collect();
        variables.sort();
        variables.dedup();
        variables
    }

    /// Stable textual form, used in cache keys and logs
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Mode::Current => "current".to_string(),
            Mode::Forecast { days } => format!("forecast:{days}"),
            Mode::Historical { start, end } => format!("historical:{start}:{end}"),
        }
    }
}

/// Validate a historical date range against `today`
pub fn validate_date_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<()> {
    if start > end {
        return Err(WeatherError::validation(format!(
            "start date {start} is after end date {end}"
        )));
    }
    if end > today {
        return Err(WeatherError::validation(format!(
            "end date {end} is in the future (today is {today})"
        )));
    }
    if start < earliest_historical_date() {
        return Err(WeatherError::validation(format!(
            "historical data starts at {}, got {start}",
            earliest_historical_date()
        )));
    }
    Ok(())
}

/// Columnar payload as delivered by the API, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    /// Location the payload was requested for
    pub location: Location,
    /// Timestamps as sent by the API
    pub time: Vec<String>,
    /// API field name to values, `None` where the API sent null
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
    /// API field name to unit string
    pub units: BTreeMap<String, String>,
    /// Offset of the API's local timestamps east of UTC
    pub utc_offset_seconds: i32,
}

impl RawSeries {
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            location,
            time: Vec::new(),
            columns: BTreeMap::new(),
            units: BTreeMap::new(),
            utc_offset_seconds: 0,
        }
    }

    /// Append a column with its unit
    #[must_use]
    pub fn with_column(
        mut self,
        field: impl Into<String>,
        unit: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Self {
        let field = field.into();
        self.units.insert(field.clone(), unit.into());
        self.columns.insert(field, values);
        self
    }
}

/// A source of weather data. Implementations make exactly one attempt per
/// call and map transport and API failures to [`WeatherError`].
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the raw payload for a location and mode
    async fn fetch_raw(&self, location: &Location, mode: Mode) -> Result<RawSeries>;

    /// Resolve a place name to candidate locations, best match first
    async fn geocode(&self, name: &str) -> Result<Vec<Location>>;

    /// Current conditions as a single record
    async fn fetch_current(&self, location: &Location) -> Result<WeatherRecord> {
        let mode = Mode::Current;
        let raw = self.fetch_raw(location, mode).await?;
        normalize(raw, &mode.variables())
            .into_iter()
            .next_back()
            .ok_or_else(|| WeatherError::api("response carried no current conditions"))
    }

    /// Daily forecast, `days` clamped to `1..=16`
    async fn fetch_forecast(&self, location: &Location, days: u32) -> Result<Vec<WeatherRecord>> {
        let mode = Mode::forecast(days);
        let raw = self.fetch_raw(location, mode).await?;
        Ok(normalize(raw, &mode.variables()))
    }

    /// Daily history for an inclusive date range
    async fn fetch_historical(
        &self,
        location: &Location,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>> {
        let mode = Mode::historical(start, end)?;
        let raw = self.fetch_raw(location, mode).await?;
        Ok(normalize(raw, &mode.variables()))
    }
}
