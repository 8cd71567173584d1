//! Descriptive statistics, anomalies, trends and period aggregates

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use super::indices::temperature_variable;
use crate::models::{Variable, WeatherRecord};

/// Minimum number of values before anomalies are looked for
pub const MIN_ANOMALY_POINTS: usize = 10;
/// Minimum number of values before patterns are looked for
pub const MIN_PATTERN_POINTS: usize = 7;
/// Slope per step above which a series counts as rising
pub const TREND_SLOPE_THRESHOLD: f64 = 0.2;

#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation, `None` for fewer than two values
#[must_use]
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn present(records: &[WeatherRecord], variable: Variable) -> Vec<(usize, f64)> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.get(variable).map(|v| (i, v)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Statistics over the values present for `variable`
#[must_use]
pub fn statistics(records: &[WeatherRecord], variable: Variable) -> Option<Statistics> {
    let values: Vec<f64> = present(records, variable).into_iter().map(|(_, v)| v).collect();
    let avg = mean(&values)?;
    Some(Statistics {
        count: values.len(),
        mean: avg,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_dev: sample_std_dev(&values).unwrap_or(0.0),
    })
}

/// Statistics for every variable with at least one value
#[must_use]
pub fn statistics_all(records: &[WeatherRecord]) -> BTreeMap<Variable, Statistics> {
    Variable::ALL
        .into_iter()
        .filter_map(|v| statistics(records, v).map(|s| (v, s)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub variable: Variable,
    pub value: f64,
    pub z_score: f64,
}

/// Values whose absolute z-score exceeds `threshold`
#[must_use]
pub fn detect_anomalies(
    records: &[WeatherRecord],
    variable: Variable,
    threshold: f64,
) -> Vec<Anomaly> {
    let points = present(records, variable);
    if points.len() < MIN_ANOMALY_POINTS {
        return Vec::new();
    }
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let (Some(avg), Some(std)) = (mean(&values), sample_std_dev(&values)) else {
        return Vec::new();
    };
    if std == 0.0 {
        return Vec::new();
    }

    let anomalies: Vec<Anomaly> = points
        .into_iter()
        .filter_map(|(i, value)| {
            let z_score = ((value - avg) / std).abs();
            (z_score > threshold).then(|| Anomaly {
                timestamp: records[i].timestamp,
                variable,
                value,
                z_score,
            })
        })
        .collect();
    if !anomalies.is_empty() {
        tracing::debug!(count = anomalies.len(), variable = %variable, "Anomalies detected");
    }
    anomalies
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    /// Least-squares slope per record
    pub slope: f64,
    pub direction: TrendDirection,
}

/// Least-squares trend over the values present for `variable`
#[must_use]
pub fn trend(records: &[WeatherRecord], variable: Variable) -> Option<Trend> {
    let values: Vec<f64> = present(records, variable).into_iter().map(|(_, v)| v).collect();
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(&values)?;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    let slope = num / den;
    let direction = if slope > TREND_SLOPE_THRESHOLD {
        TrendDirection::Rising
    } else if slope < -TREND_SLOPE_THRESHOLD {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    };
    Some(Trend { slope, direction })
}

/// Centered moving average; `None` where the window is incomplete or
/// contains a missing value.
#[must_use]
pub fn moving_average(
    records: &[WeatherRecord],
    variable: Variable,
    window: usize,
) -> Vec<Option<f64>> {
    let values: Vec<Option<f64>> = records.iter().map(|r| r.get(variable)).collect();
    if window == 0 {
        return vec![None; values.len()];
    }
    let before = window / 2;
    (0..values.len())
        .map(|i| {
            let start = i.checked_sub(before)?;
            let slice = values.get(start..start + window)?;
            let window_values: Option<Vec<f64>> = slice.iter().copied().collect();
            mean(&window_values?)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    pub year: i32,
    pub month: u32,
    pub records: usize,
    pub mean_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub total_precipitation: Option<f64>,
    pub rainy_days: usize,
    pub mean_wind_speed: Option<f64>,
}

impl MonthlyAggregate {
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

fn daily_mean_temperature(record: &WeatherRecord) -> Option<f64> {
    record
        .get(Variable::TemperatureMean)
        .or_else(|| {
            match (
                record.get(Variable::TemperatureMax),
                record.get(Variable::TemperatureMin),
            ) {
                (Some(max), Some(min)) => Some((max + min) / 2.0),
                _ => None,
            }
        })
        .or_else(|| record.get(Variable::Temperature))
}

/// Meteorological seasons in calendar order
pub const SEASONS: [&str; 4] = [
    "Winter (Dec-Feb)",
    "Spring (Mar-May)",
    "Summer (Jun-Aug)",
    "Autumn (Sep-Nov)",
];

/// Season a calendar month falls in
#[must_use]
pub fn season(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => SEASONS[0],
        3..=5 => SEASONS[1],
        6..=8 => SEASONS[2],
        _ => SEASONS[3],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonalStatistics {
    pub season: &'static str,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Statistics of `variable` per season, seasons without values left out
#[must_use]
pub fn seasonal_statistics(records: &[WeatherRecord], variable: Variable) -> Vec<SeasonalStatistics> {
    SEASONS
        .into_iter()
        .filter_map(|name| {
            let values: Vec<f64> = records
                .iter()
                .filter(|r| season(r.timestamp.month()) == name)
                .filter_map(|r| r.get(variable))
                .collect();
            Some(SeasonalStatistics {
                season: name,
                count: values.len(),
                mean: mean(&values)?,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        })
        .collect()
}

/// Pearson correlation of two variables over the records carrying both.
/// `None` for fewer than three pairs or a constant column.
#[must_use]
pub fn correlation(records: &[WeatherRecord], a: Variable, b: Variable) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| Some((r.get(a)?, r.get(b)?)))
        .collect();
    if pairs.len() < 3 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a < f64::EPSILON || var_b < f64::EPSILON {
        return None;
    }
    Some((cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0))
}

/// Per calendar month aggregates, oldest month first
#[must_use]
pub fn monthly_aggregates(records: &[WeatherRecord]) -> Vec<MonthlyAggregate> {
    let mut months: BTreeMap<(i32, u32), Vec<&WeatherRecord>> = BTreeMap::new();
    for record in records {
        months
            .entry((record.timestamp.year(), record.timestamp.month()))
            .or_default()
            .push(record);
    }

    months
        .into_iter()
        .map(|((year, month), group)| {
            let means: Vec<f64> = group.iter().filter_map(|r| daily_mean_temperature(r)).collect();
            let highs: Vec<f64> = group
                .iter()
                .filter_map(|r| {
                    r.get(Variable::TemperatureMax)
                        .or_else(|| r.get(Variable::Temperature))
                })
                .collect();
            let lows: Vec<f64> = group
                .iter()
                .filter_map(|r| {
                    r.get(Variable::TemperatureMin)
                        .or_else(|| r.get(Variable::Temperature))
                })
                .collect();
            let rain: Vec<f64> = group
                .iter()
                .filter_map(|r| r.get(Variable::Precipitation))
                .collect();
            let wind: Vec<f64> = group.iter().filter_map(|r| r.get(Variable::WindSpeed)).collect();

            MonthlyAggregate {
                year,
                month,
                records: group.len(),
                mean_temperature: mean(&means),
                max_temperature: highs.iter().copied().reduce(f64::max),
                min_temperature: lows.iter().copied().reduce(f64::min),
                total_precipitation: (!rain.is_empty()).then(|| rain.iter().sum()),
                rainy_days: rain.iter().filter(|p| **p > 0.0).count(),
                mean_wind_speed: mean(&wind),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Difference {
    pub first: f64,
    pub second: f64,
    /// `second - first`
    pub difference: f64,
}

impl Difference {
    fn between(first: f64, second: f64) -> Self {
        Self {
            first,
            second,
            difference: second - first,
        }
    }

    #[must_use]
    pub fn describe(&self, unit: &str) -> String {
        let verb = if self.difference > 0.0 {
            "up"
        } else if self.difference < 0.0 {
            "down"
        } else {
            "unchanged"
        };
        format!("{verb} {:.1} {unit}", self.difference.abs())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub first_label: String,
    pub second_label: String,
    /// Mean temperature of each period
    pub temperature: Option<Difference>,
    /// Total precipitation of each period
    pub precipitation: Option<Difference>,
}

/// Compare mean temperature and total precipitation of two periods
#[must_use]
pub fn compare_periods(
    first: &[WeatherRecord],
    second: &[WeatherRecord],
    first_label: impl Into<String>,
    second_label: impl Into<String>,
) -> PeriodComparison {
    let temperature = temperature_variable(first)
        .filter(|v| temperature_variable(second) == Some(*v))
        .and_then(|v| {
            let a = statistics(first, v)?;
            let b = statistics(second, v)?;
            Some(Difference::between(a.mean, b.mean))
        });

    let total = |records: &[WeatherRecord]| -> Option<f64> {
        let rain = present(records, Variable::Precipitation);
        (!rain.is_empty()).then(|| rain.iter().map(|(_, v)| v).sum())
    };
    let precipitation = match (total(first), total(second)) {
        (Some(a), Some(b)) => Some(Difference::between(a, b)),
        _ => None,
    };

    PeriodComparison {
        first_label: first_label.into(),
        second_label: second_label.into(),
        temperature,
        precipitation,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patterns {
    pub temperature_trend: Option<Trend>,
    /// Days that are the third or later in a run above 35 °C
    pub heat_wave_days: usize,
    /// Days that are the fifth or later in a run without rain
    pub dry_spell_days: usize,
    /// Days that are the third or later in a run with rain
    pub wet_spell_days: usize,
}

/// Heat-wave, dry-spell and wet-spell detection over a daily series
#[must_use]
pub fn detect_patterns(records: &[WeatherRecord]) -> Option<Patterns> {
    if records.len() < MIN_PATTERN_POINTS {
        return None;
    }

    let temp_var = temperature_variable(records);
    let mut temp_points = 0;
    let mut heat_wave_days = 0;
    let mut streak = 0;
    for t in records.iter().map(|r| temp_var.and_then(|v| r.get(v))) {
        match t {
            Some(t) if t > 35.0 => {
                temp_points += 1;
                streak += 1;
                if streak >= 3 {
                    heat_wave_days += 1;
                }
            }
            Some(_) => {
                temp_points += 1;
                streak = 0;
            }
            // a gap breaks the run
            None => streak = 0,
        }
    }

    let (mut dry_spell_days, mut wet_spell_days) = (0, 0);
    let (mut dry, mut wet) = (0, 0);
    for p in records.iter().map(|r| r.get(Variable::Precipitation)) {
        match p {
            Some(p) if p == 0.0 => {
                dry += 1;
                wet = 0;
                if dry >= 5 {
                    dry_spell_days += 1;
                }
            }
            Some(_) => {
                wet += 1;
                dry = 0;
                if wet >= 3 {
                    wet_spell_days += 1;
                }
            }
            None => (dry, wet) = (0, 0),
        }
    }

    Some(Patterns {
        temperature_trend: temp_var
            .filter(|_| temp_points >= MIN_PATTERN_POINTS)
            .and_then(|v| trend(records, v)),
        heat_wave_days,
        dry_spell_days,
        wet_spell_days,
    })
}
