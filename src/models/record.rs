//! Normalized weather record and the canonical variable set

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Location;
use crate::WeatherError;

/// Canonical weather variables, always expressed in the units of [`Variable::unit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Temperature,
    TemperatureMax,
    TemperatureMin,
    TemperatureMean,
    Humidity,
    Precipitation,
    WindSpeed,
    WindDirection,
    Pressure,
}

impl Variable {
    pub const ALL: [Variable; 9] = [
        Variable::Temperature,
        Variable::TemperatureMax,
        Variable::TemperatureMin,
        Variable::TemperatureMean,
        Variable::Humidity,
        Variable::Precipitation,
        Variable::WindSpeed,
        Variable::WindDirection,
        Variable::Pressure,
    ];

    /// Canonical column name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::TemperatureMax => "temperature_max",
            Variable::TemperatureMin => "temperature_min",
            Variable::TemperatureMean => "temperature_mean",
            Variable::Humidity => "humidity",
            Variable::Precipitation => "precipitation",
            Variable::WindSpeed => "wind_speed",
            Variable::WindDirection => "wind_direction",
            Variable::Pressure => "pressure",
        }
    }

    /// Human readable label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Variable::Temperature => "Temperature",
            Variable::TemperatureMax => "Max temperature",
            Variable::TemperatureMin => "Min temperature",
            Variable::TemperatureMean => "Mean temperature",
            Variable::Humidity => "Humidity",
            Variable::Precipitation => "Precipitation",
            Variable::WindSpeed => "Wind speed",
            Variable::WindDirection => "Wind direction",
            Variable::Pressure => "Pressure",
        }
    }

    /// Canonical unit
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Variable::Temperature
            | Variable::TemperatureMax
            | Variable::TemperatureMin
            | Variable::TemperatureMean => "°C",
            Variable::Humidity => "%",
            Variable::Precipitation => "mm",
            Variable::WindSpeed => "km/h",
            Variable::WindDirection => "°",
            Variable::Pressure => "hPa",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Variable::ALL
            .into_iter()
            .find(|v| v.as_str() == needle)
            .ok_or_else(|| WeatherError::validation(format!("unknown variable '{s}'")))
    }
}

/// One normalized observation or forecast point.
///
/// Every variable the series was requested with has an entry in `values`;
/// `None` marks "no data" and is never silently dropped or zeroed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherRecord {
    /// Timestamp of the observation (daily values use midnight UTC)
    pub timestamp: DateTime<Utc>,
    /// Location the record belongs to
    pub location: Location,
    /// Canonical variable values
    pub values: BTreeMap<Variable, Option<f64>>,
}

impl WeatherRecord {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, location: Location) -> Self {
        Self {
            timestamp,
            location,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter
    #[must_use]
    pub fn with(mut self, variable: Variable, value: Option<f64>) -> Self {
        self.values.insert(variable, value);
        self
    }

    /// Value for a variable, `None` when absent or marked as no data
    #[must_use]
    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied().flatten()
    }

    /// True when the variable carries no usable value
    #[must_use]
    pub fn is_missing(&self, variable: Variable) -> bool {
        self.get(variable).is_none()
    }

    /// First variable of `candidates` that this record carries a column for
    #[must_use]
    pub fn first_present(&self, candidates: &[Variable]) -> Option<Variable> {
        candidates
            .iter()
            .copied()
            .find(|v| self.values.contains_key(v))
    }

    /// Convert wind direction from degrees to a 16-point compass direction
    #[must_use]
    pub fn wind_direction_to_cardinal(degrees: f64) -> &'static str {
        const POINTS: [&str; 16] = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W",
            "WNW", "NW", "NNW",
        ];
        if !degrees.is_finite() {
            return "Unknown";
        }
        let index = (degrees.rem_euclid(360.0) / 22.5).round() as usize % 16;
        POINTS[index]
    }

    /// Format a value with its unit, or "N/A"
    #[must_use]
    pub fn format_value(&self, variable: Variable) -> String {
        match self.get(variable) {
            Some(value) if variable == Variable::Humidity => format!("{value:.0}%"),
            Some(value) if variable == Variable::WindDirection => {
                format!("{value:.0}° {}", Self::wind_direction_to_cardinal(value))
            }
            Some(value) => format!("{value:.1} {}", variable.unit()),
            None => "N/A".to_string(),
        }
    }
}

/// Columns present in any record, in canonical order
#[must_use]
pub fn columns(records: &[WeatherRecord]) -> Vec<Variable> {
    Variable::ALL
        .into_iter()
        .filter(|v| records.iter().any(|r| r.values.contains_key(v)))
        .collect()
}

/// All values of one variable, `None` where a record has no data
#[must_use]
pub fn series(records: &[WeatherRecord], variable: Variable) -> Vec<Option<f64>> {
    records.iter().map(|r| r.get(variable)).collect()
}
