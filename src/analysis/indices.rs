//! Climate and comfort indices

use std::collections::BTreeMap;

use super::alerts::{HEAT_VARIABLES, heat_temperature};
use super::stats::{mean, sample_std_dev};
use crate::models::{Variable, WeatherRecord};

/// Days above this maximum count as hot
pub const HOT_DAY_CELSIUS: f64 = 30.0;
/// Days below this count as cool
pub const COOL_DAY_CELSIUS: f64 = 20.0;

/// Temperature variable a series is analysed on: the first of
/// [`HEAT_VARIABLES`] any record carries a column for.
#[must_use]
pub fn temperature_variable(records: &[WeatherRecord]) -> Option<Variable> {
    HEAT_VARIABLES
        .into_iter()
        .find(|v| records.iter().any(|r| r.values.contains_key(v)))
}

/// All values of `variable`, or `None` when the series is empty or any
/// record lacks a value.
#[must_use]
pub fn complete_series(records: &[WeatherRecord], variable: Variable) -> Option<Vec<f64>> {
    if records.is_empty() {
        return None;
    }
    records.iter().map(|r| r.get(variable)).collect()
}

/// Heat index ("feels like") in °C from temperature and relative humidity,
/// using the NWS Rothfusz regression. `None` if either input is missing.
#[must_use]
pub fn heat_index(record: &WeatherRecord) -> Option<f64> {
    let celsius = heat_temperature(record)?;
    let humidity = record.get(Variable::Humidity)?;
    Some(heat_index_celsius(celsius, humidity))
}

fn heat_index_celsius(celsius: f64, humidity: f64) -> f64 {
    let t = celsius * 9.0 / 5.0 + 32.0;
    let rh = humidity;

    let simple = 0.5 * (t + 61.0 + (t - 68.0) * 1.2 + rh * 0.094);
    let fahrenheit = if (simple + t) / 2.0 < 80.0 {
        simple
    } else {
        let mut hi = -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
            - 0.224_755_41 * t * rh
            - 0.006_837_83 * t * t
            - 0.054_817_17 * rh * rh
            + 0.001_228_74 * t * t * rh
            + 0.000_852_82 * t * rh * rh
            - 0.000_001_99 * t * t * rh * rh;
        if rh < 13.0 && (80.0..=112.0).contains(&t) {
            hi -= ((13.0 - rh) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
        } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
            hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
        }
        hi
    };
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Comfort score of one temperature/humidity pair: 100, 75 or 50
#[must_use]
pub fn comfort_score(celsius: f64, humidity: f64) -> f64 {
    if (18.0..=26.0).contains(&celsius) && (40.0..=60.0).contains(&humidity) {
        100.0
    } else if (15.0..=30.0).contains(&celsius) && (30.0..=70.0).contains(&humidity) {
        75.0
    } else {
        50.0
    }
}

#[must_use]
pub fn comfort_level(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "very comfortable",
        s if s >= 75.0 => "comfortable",
        s if s >= 60.0 => "fairly comfortable",
        s if s >= 40.0 => "uncomfortable",
        _ => "very uncomfortable",
    }
}

/// Series-level climate indices.
///
/// An index is left out when any input it depends on is missing anywhere in
/// the series; nothing is defaulted to zero.
#[must_use]
pub fn compute_climate_indices(records: &[WeatherRecord]) -> BTreeMap<String, f64> {
    let mut indices = BTreeMap::new();

    let temperatures =
        temperature_variable(records).and_then(|v| complete_series(records, v));
    if let Some(temps) = &temperatures {
        if let Some(avg) = mean(temps) {
            indices.insert("mean_temperature".to_string(), avg);
        }
        let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = temps.iter().copied().fold(f64::INFINITY, f64::min);
        indices.insert("temperature_range".to_string(), max - min);
        if let Some(std) = sample_std_dev(temps) {
            indices.insert("temperature_variability".to_string(), std);
        }
        indices.insert(
            "hot_days".to_string(),
            temps.iter().filter(|t| **t > HOT_DAY_CELSIUS).count() as f64,
        );
        indices.insert(
            "cool_days".to_string(),
            temps.iter().filter(|t| **t < COOL_DAY_CELSIUS).count() as f64,
        );
    }

    if let Some(rain) = complete_series(records, Variable::Precipitation) {
        let wet: Vec<f64> = rain.iter().copied().filter(|p| *p > 0.0).collect();
        indices.insert("total_precipitation".to_string(), rain.iter().sum());
        indices.insert("rainy_days".to_string(), wet.len() as f64);
        indices.insert(
            "dry_days".to_string(),
            rain.iter().filter(|p| **p == 0.0).count() as f64,
        );
        indices.insert(
            "max_daily_precipitation".to_string(),
            rain.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        );
        if let Some(avg) = mean(&wet) {
            indices.insert("mean_precipitation_per_rainy_day".to_string(), avg);
        }
    }

    let humidity = complete_series(records, Variable::Humidity);
    if let (Some(temps), Some(humidity)) = (&temperatures, &humidity) {
        let scores: Vec<f64> = temps
            .iter()
            .zip(humidity)
            .map(|(t, h)| comfort_score(*t, *h))
            .collect();
        if let Some(avg) = mean(&scores) {
            indices.insert("comfort_score".to_string(), avg);
            indices.insert(
                "comfortable_days".to_string(),
                scores.iter().filter(|s| **s >= 100.0).count() as f64,
            );
        }
    }

    let heat: Option<Vec<f64>> = if records.is_empty() {
        None
    } else {
        records.iter().map(heat_index).collect()
    };
    if let Some(avg) = heat.as_deref().and_then(mean) {
        indices.insert("mean_heat_index".to_string(), avg);
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AlertCategory;
    use crate::models::Location;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[(Option<f64>, Option<f64>, Option<f64>)]) -> Vec<WeatherRecord> {
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, (temp, rain, humidity))| {
                WeatherRecord::new(
                    start + Duration::days(i as i64),
                    Location::new(21.0278, 105.8342, "Hà Nội"),
                )
                .with(Variable::TemperatureMax, *temp)
                .with(Variable::Precipitation, *rain)
                .with(Variable::Humidity, *humidity)
            })
            .collect()
    }

    #[test]
    fn test_missing_precipitation_omits_rain_indices() {
        let records = series(&[
            (Some(31.0), Some(2.0), Some(70.0)),
            (Some(33.0), None, Some(75.0)),
        ]);
        let indices = compute_climate_indices(&records);

        assert!(!indices.contains_key("total_precipitation"));
        assert!(!indices.contains_key("rainy_days"));
        assert!(!indices.contains_key("dry_days"));
        assert!(!indices.contains_key("max_daily_precipitation"));
        assert_eq!(indices["mean_temperature"], 32.0);
    }

    #[test]
    fn test_complete_series_indices() {
        let records = series(&[
            (Some(31.0), Some(0.0), Some(50.0)),
            (Some(19.0), Some(12.0), Some(50.0)),
            (Some(25.0), Some(4.0), Some(50.0)),
        ]);
        let indices = compute_climate_indices(&records);

        assert_eq!(indices["total_precipitation"], 16.0);
        assert_eq!(indices["rainy_days"], 2.0);
        assert_eq!(indices["dry_days"], 1.0);
        assert_eq!(indices["max_daily_precipitation"], 12.0);
        assert_eq!(indices["mean_precipitation_per_rainy_day"], 8.0);
        assert_eq!(indices["hot_days"], 1.0);
        assert_eq!(indices["cool_days"], 1.0);
        assert_eq!(indices["temperature_range"], 12.0);
        assert!(indices.contains_key("comfort_score"));
        assert!(indices.contains_key("mean_heat_index"));
    }

    #[test]
    fn test_missing_humidity_omits_comfort_and_heat_index() {
        let records = series(&[(Some(31.0), Some(0.0), None), (Some(30.0), Some(1.0), Some(60.0))]);
        let indices = compute_climate_indices(&records);
        assert!(!indices.contains_key("comfort_score"));
        assert!(!indices.contains_key("mean_heat_index"));
        assert!(indices.contains_key("total_precipitation"));
    }

    #[test]
    fn test_empty_series_has_no_indices() {
        assert!(compute_climate_indices(&[]).is_empty());
    }

    #[test]
    fn test_heat_index() {
        let mild = series(&[(Some(20.0), None, Some(50.0))]);
        let hi = heat_index(&mild[0]).unwrap();
        assert!((hi - 19.36).abs() < 0.05, "{hi}");

        let muggy = series(&[(Some(32.0), None, Some(70.0))]);
        assert!(heat_index(&muggy[0]).unwrap() > 32.0);

        let dry = series(&[(Some(32.0), None, None)]);
        assert_eq!(heat_index(&dry[0]), None);
    }

    #[test]
    fn test_heat_index_uses_the_alert_temperature() {
        let record = series(&[(Some(20.0), None, Some(50.0))])
            .remove(0)
            .with(Variable::Temperature, Some(32.0))
            .with(Variable::TemperatureMean, Some(26.0));
        let expected = heat_index(&series(&[(Some(20.0), None, Some(50.0))])[0]);

        assert_eq!(heat_index(&record), expected);
        assert_eq!(heat_temperature(&record), Some(20.0));
        assert_eq!(
            AlertCategory::Heat.variable_for(&record),
            Some(Variable::TemperatureMax)
        );
    }

    #[test]
    fn test_comfort_levels() {
        assert_eq!(comfort_score(22.0, 50.0), 100.0);
        assert_eq!(comfort_score(28.0, 65.0), 75.0);
        assert_eq!(comfort_score(35.0, 90.0), 50.0);
        assert_eq!(comfort_level(100.0), "very comfortable");
        assert_eq!(comfort_level(50.0), "uncomfortable");
    }
}
