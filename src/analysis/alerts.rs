//! Threshold alerts for heat, rain and wind

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Variable, WeatherRecord};
use crate::{Result, WeatherError};

/// Temperature variables checked for heat, in order of preference
pub const HEAT_VARIABLES: [Variable; 3] = [
    Variable::TemperatureMax,
    Variable::Temperature,
    Variable::TemperatureMean,
];

/// First temperature of [`HEAT_VARIABLES`] the record has a value for
#[must_use]
pub fn heat_temperature(record: &WeatherRecord) -> Option<f64> {
    HEAT_VARIABLES.into_iter().find_map(|v| record.get(v))
}

/// Alert thresholds; a value at or above the threshold raises an alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Temperature in °C
    pub heat: f64,
    /// Precipitation in mm
    pub rain: f64,
    /// Wind speed in km/h
    pub wind: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heat: 35.0,
            rain: 50.0,
            wind: 25.0,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.heat.is_finite() || !(-50.0..=60.0).contains(&self.heat) {
            return Err(WeatherError::validation(format!(
                "heat threshold must be between -50 and 60 °C, got {}",
                self.heat
            )));
        }
        if !self.rain.is_finite() || self.rain <= 0.0 {
            return Err(WeatherError::validation(format!(
                "rain threshold must be positive, got {}",
                self.rain
            )));
        }
        if !self.wind.is_finite() || self.wind <= 0.0 {
            return Err(WeatherError::validation(format!(
                "wind threshold must be positive, got {}",
                self.wind
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn threshold(&self, category: AlertCategory) -> f64 {
        match category {
            AlertCategory::Heat => self.heat,
            AlertCategory::Rain => self.rain,
            AlertCategory::Wind => self.wind,
        }
    }

    /// Level at which an alert of `category` becomes dangerous
    #[must_use]
    pub fn danger_level(&self, category: AlertCategory) -> f64 {
        match category {
            AlertCategory::Heat => self.heat + 3.0,
            AlertCategory::Rain => self.rain * 2.0,
            AlertCategory::Wind => self.wind * 1.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Heat,
    Rain,
    Wind,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 3] = [AlertCategory::Heat, AlertCategory::Rain, AlertCategory::Wind];

    /// Variable the category is evaluated on for a given record
    #[must_use]
    pub fn variable_for(self, record: &WeatherRecord) -> Option<Variable> {
        match self {
            AlertCategory::Heat => HEAT_VARIABLES
                .into_iter()
                .find(|v| record.get(*v).is_some()),
            AlertCategory::Rain => Some(Variable::Precipitation),
            AlertCategory::Wind => Some(Variable::WindSpeed),
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            AlertCategory::Heat => "Heat",
            AlertCategory::Rain => "Heavy rain",
            AlertCategory::Wind => "Strong wind",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlertCategory::Heat => "heat",
            AlertCategory::Rain => "rain",
            AlertCategory::Wind => "wind",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub category: AlertCategory,
    pub severity: Severity,
    /// Record that crossed the threshold
    pub record: WeatherRecord,
    pub variable: Variable,
    pub threshold: f64,
    pub value: f64,
}

impl Alert {
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "{} {}: {:.1} {} on {} (threshold {:.1} {})",
            self.category.title(),
            self.severity,
            self.value,
            self.variable.unit(),
            self.record.timestamp.format("%Y-%m-%d %H:%M"),
            self.threshold,
            self.variable.unit(),
        )
    }
}

/// One alert per (record, category) whose value reaches the threshold.
/// Records are evaluated independently; missing values never alert.
#[must_use]
pub fn generate_alerts(records: &[WeatherRecord], thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for record in records {
        for category in AlertCategory::ALL {
            let Some(variable) = category.variable_for(record) else {
                continue;
            };
            let Some(value) = record.get(variable) else {
                continue;
            };
            let threshold = thresholds.threshold(category);
            if value < threshold {
                continue;
            }
            let severity = if value >= thresholds.danger_level(category) {
                Severity::Danger
            } else {
                Severity::Warning
            };
            alerts.push(Alert {
                category,
                severity,
                record: record.clone(),
                variable,
                threshold,
                value,
            });
        }
    }
    alerts
}
