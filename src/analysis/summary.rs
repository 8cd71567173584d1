//! Plain-language summaries of a series

use super::alerts::{AlertThresholds, Severity, generate_alerts};
use super::indices::{comfort_level, compute_climate_indices};
use super::stats::{TrendDirection, detect_patterns};
use crate::models::WeatherRecord;

/// Short description of conditions, e.g. "Hot, light rain, strong wind"
#[must_use]
pub fn describe_conditions(
    temperature: Option<f64>,
    precipitation: Option<f64>,
    wind_speed: Option<f64>,
) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(t) = temperature {
        parts.push(match t {
            t if t < 15.0 => "cold",
            t if t < 25.0 => "cool",
            t if t < 30.0 => "warm",
            t if t < 35.0 => "hot",
            _ => "very hot",
        });
    }
    match precipitation {
        Some(p) if p > 50.0 => parts.push("heavy rain"),
        Some(p) if p > 10.0 => parts.push("moderate rain"),
        Some(p) if p > 0.0 => parts.push("light rain"),
        _ => {}
    }
    match wind_speed {
        Some(w) if w > 25.0 => parts.push("strong wind"),
        Some(w) if w > 15.0 => parts.push("moderate wind"),
        _ => {}
    }

    let joined = parts.join(", ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "No data".to_string(),
    }
}

/// Summary using the default alert thresholds
#[must_use]
pub fn summarize(records: &[WeatherRecord]) -> String {
    summarize_with_thresholds(records, &AlertThresholds::default())
}

#[must_use]
pub fn summarize_with_thresholds(records: &[WeatherRecord], thresholds: &AlertThresholds) -> String {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return "No data to analyse.".to_string();
    };

    let place = first.location.display_name();
    let indices = compute_climate_indices(records);
    let mut sentences = vec![format!(
        "Weather at {place} from {} to {}.",
        first.timestamp.format("%Y-%m-%d"),
        last.timestamp.format("%Y-%m-%d")
    )];

    if let (Some(mean), Some(range)) = (
        indices.get("mean_temperature"),
        indices.get("temperature_range"),
    ) {
        sentences.push(format!(
            "Mean temperature was {mean:.1} °C with a range of {range:.1} °C."
        ));
    }
    if let Some(hot) = indices.get("hot_days").filter(|h| **h > 0.0) {
        sentences.push(format!("{hot:.0} hot days above 30 °C."));
    }
    if let (Some(total), Some(rainy)) = (
        indices.get("total_precipitation"),
        indices.get("rainy_days"),
    ) {
        sentences.push(format!(
            "Total precipitation was {total:.1} mm over {rainy:.0} rainy days."
        ));
    }

    if let Some(patterns) = detect_patterns(records) {
        if let Some(trend) = patterns.temperature_trend {
            let direction = match trend.direction {
                TrendDirection::Rising => "rising",
                TrendDirection::Falling => "falling",
                TrendDirection::Stable => "stable",
            };
            sentences.push(format!(
                "Temperatures are {direction} ({:+.2} °C per record).",
                trend.slope
            ));
        }
        if patterns.heat_wave_days > 0 {
            sentences.push(format!(
                "{} heat-wave days were recorded.",
                patterns.heat_wave_days
            ));
        }
    }

    let dangers: Vec<String> = generate_alerts(records, thresholds)
        .into_iter()
        .filter(|a| a.severity == Severity::Danger)
        .map(|a| a.message())
        .collect();
    if !dangers.is_empty() {
        sentences.push(format!("Attention: {}.", dangers.join("; ")));
    }

    if let Some(score) = indices.get("comfort_score") {
        sentences.push(format!(
            "Comfort: {} ({score:.0}/100).",
            comfort_level(*score)
        ));
    }

    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, Variable};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_describe_conditions() {
        assert_eq!(
            describe_conditions(Some(36.0), Some(12.0), Some(30.0)),
            "Very hot, moderate rain, strong wind"
        );
        assert_eq!(describe_conditions(Some(22.0), Some(0.0), None), "Cool");
        assert_eq!(describe_conditions(None, None, None), "No data");
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), "No data to analyse.");
    }

    #[test]
    fn test_summarize_mentions_key_figures() {
        let records = vec![
            WeatherRecord::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
                Location::new(16.4637, 107.5909, "Huế"),
            )
            .with(Variable::TemperatureMax, Some(39.0))
            .with(Variable::Precipitation, Some(3.0)),
            WeatherRecord::new(
                Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap(),
                Location::new(16.4637, 107.5909, "Huế"),
            )
            .with(Variable::TemperatureMax, Some(33.0))
            .with(Variable::Precipitation, Some(0.0)),
        ];
        let summary = summarize(&records);

        assert!(summary.starts_with("Weather at Huế from 2024-06-01 to 2024-06-02."));
        assert!(summary.contains("Mean temperature was 36.0 °C"));
        assert!(summary.contains("Total precipitation was 3.0 mm over 1 rainy days."));
        assert!(summary.contains("Attention: Heat danger"));
    }
}
