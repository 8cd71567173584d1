//! Normalization of raw API payloads into [`WeatherRecord`]s

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::{Variable, WeatherRecord};
use crate::weather::RawSeries;

/// Map an API field name to its canonical variable
#[must_use]
pub fn canonical_variable(field: &str) -> Option<Variable> {
    let variable = match field {
        "temperature_2m" | "temperature" => Variable::Temperature,
        "temperature_2m_max" => Variable::TemperatureMax,
        "temperature_2m_min" => Variable::TemperatureMin,
        "temperature_2m_mean" => Variable::TemperatureMean,
        "relative_humidity_2m" | "relativehumidity_2m" | "humidity" => Variable::Humidity,
        "precipitation" | "precipitation_sum" => Variable::Precipitation,
        "wind_speed_10m" | "windspeed_10m" | "wind_speed_10m_max" | "windspeed_10m_max" => {
            Variable::WindSpeed
        }
        "wind_direction_10m"
        | "winddirection_10m"
        | "wind_direction_10m_dominant"
        | "winddirection_10m_dominant" => Variable::WindDirection,
        "pressure_msl" | "surface_pressure" => Variable::Pressure,
        _ => return None,
    };
    Some(variable)
}

/// Convert a value in `unit` to the canonical unit of `variable`.
/// Unknown units are assumed to already be canonical.
#[must_use]
pub fn to_canonical_unit(variable: Variable, unit: Option<&str>, value: f64) -> f64 {
    let unit = unit.map(str::trim).unwrap_or_default();
    match variable {
        Variable::Temperature
        | Variable::TemperatureMax
        | Variable::TemperatureMin
        | Variable::TemperatureMean => match unit {
            "°F" | "F" | "fahrenheit" => (value - 32.0) * 5.0 / 9.0,
            "K" => value - 273.15,
            _ => value,
        },
        Variable::WindSpeed => match unit {
            "m/s" | "ms" => value * 3.6,
            "mph" => value * 1.609_344,
            "kn" | "kt" | "knots" => value * 1.852,
            _ => value,
        },
        Variable::Precipitation => match unit {
            "inch" | "in" => value * 25.4,
            _ => value,
        },
        Variable::Humidity | Variable::WindDirection | Variable::Pressure => value,
    }
}

/// Parse an API timestamp given in UTC, either a date or a
/// minute-resolution datetime
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_local_timestamp(raw, 0)
}

/// Parse an API timestamp whose datetimes are local time
/// `utc_offset_seconds` east of UTC. Dates are calendar days and stay at
/// midnight UTC.
#[must_use]
pub fn parse_local_timestamp(raw: &str, utc_offset_seconds: i32) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let local = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"));
    if let Ok(local) = local {
        return FixedOffset::east_opt(utc_offset_seconds)?
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Turn a raw columnar payload into records.
///
/// Output is sorted by timestamp with duplicates removed (first occurrence
/// wins). Every variable in `expected` gets an entry on every record, `None`
/// where the payload has no value. Unparseable timestamps are skipped.
#[must_use]
pub fn normalize(raw: RawSeries, expected: &[Variable]) -> Vec<WeatherRecord> {
    let RawSeries {
        location,
        time,
        columns,
        units,
        utc_offset_seconds,
    } = raw;

    let mut canonical: BTreeMap<Variable, Vec<Option<f64>>> = BTreeMap::new();
    for (field, values) in columns {
        let Some(variable) = canonical_variable(&field) else {
            tracing::trace!(field = %field, "Ignoring unknown field");
            continue;
        };
        // First matching field wins when the API sends aliases
        if canonical.contains_key(&variable) {
            continue;
        }
        let unit = units.get(&field).map(String::as_str);
        let converted = values
            .into_iter()
            .map(|v| {
                v.filter(|x| x.is_finite())
                    .map(|x| to_canonical_unit(variable, unit, x))
            })
            .collect();
        canonical.insert(variable, converted);
    }

    let mut records: Vec<WeatherRecord> = Vec::with_capacity(time.len());
    for (index, stamp) in time.iter().enumerate() {
        let Some(timestamp) = parse_local_timestamp(stamp, utc_offset_seconds) else {
            tracing::warn!(timestamp = %stamp, "Skipping record with unparseable timestamp");
            continue;
        };

        let mut record = WeatherRecord::new(timestamp, location.clone());
        for variable in expected {
            record.values.insert(*variable, None);
        }
        for (variable, values) in &canonical {
            record
                .values
                .insert(*variable, values.get(index).copied().flatten());
        }
        records.push(record);
    }

    records.sort_by_key(|r| r.timestamp);
    records.dedup_by_key(|r| r.timestamp);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use chrono::TimeZone;
    use rstest::rstest;

    fn hanoi() -> Location {
        Location::new(21.0278, 105.8342, "Hà Nội")
    }

    #[rstest]
    #[case(Variable::Temperature, "°F", 212.0, 100.0)]
    #[case(Variable::TemperatureMax, "°C", 31.5, 31.5)]
    #[case(Variable::WindSpeed, "m/s", 10.0, 36.0)]
    #[case(Variable::WindSpeed, "km/h", 12.0, 12.0)]
    #[case(Variable::Precipitation, "inch", 2.0, 50.8)]
    #[case(Variable::Humidity, "%", 80.0, 80.0)]
    fn test_unit_conversion(
        #[case] variable: Variable,
        #[case] unit: &str,
        #[case] input: f64,
        #[case] expected: f64,
    ) {
        let converted = to_canonical_unit(variable, Some(unit), input);
        assert!((converted - expected).abs() < 1e-9, "{converted} != {expected}");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2024-06-01"),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2024-06-01T13:45"),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 13, 45, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_local_times_are_shifted_to_utc() {
        assert_eq!(
            parse_local_timestamp("2024-06-01T19:00", 7 * 3600),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            parse_local_timestamp("2024-06-01T02:30", 7 * 3600),
            Some(Utc.with_ymd_and_hms(2024, 5, 31, 19, 30, 0).unwrap())
        );
        assert_eq!(
            parse_local_timestamp("2024-06-01", 7 * 3600),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_local_timestamp("2024-06-01T19:00", 200_000), None);
    }

    #[test]
    fn test_normalize_applies_the_payload_offset() {
        let mut raw =
            RawSeries::new(hanoi()).with_column("temperature_2m", "°C", vec![Some(30.0)]);
        raw.time = vec!["2024-06-01T19:00".to_string()];
        raw.utc_offset_seconds = 25200;

        let records = normalize(raw, &[Variable::Temperature]);

        assert_eq!(
            records[0].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_normalize_renames_and_sorts() {
        let raw = RawSeries {
            location: hanoi(),
            time: vec![
                "2024-06-02".to_string(),
                "2024-06-01".to_string(),
                "2024-06-02".to_string(),
            ],
            columns: BTreeMap::new(),
            units: BTreeMap::new(),
            utc_offset_seconds: 0,
        }
        .with_column("temperature_2m_max", "°C", vec![Some(33.0), Some(32.0), Some(99.0)])
        .with_column("wind_speed_10m_max", "m/s", vec![Some(5.0), None, Some(1.0)]);

        let records = normalize(raw, &[Variable::TemperatureMax, Variable::WindSpeed]);

        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp < records[1].timestamp);
        assert_eq!(records[0].get(Variable::TemperatureMax), Some(32.0));
        assert_eq!(records[0].get(Variable::WindSpeed), None);
        // duplicate day keeps the first occurrence
        assert_eq!(records[1].get(Variable::TemperatureMax), Some(33.0));
        assert_eq!(records[1].get(Variable::WindSpeed), Some(18.0));
    }

    #[test]
    fn test_normalize_marks_missing_columns() {
        let mut raw =
            RawSeries::new(hanoi()).with_column("temperature_2m", "°C", vec![Some(30.0)]);
        raw.time = vec!["2024-06-01T12:00".to_string()];

        let records = normalize(raw, &[Variable::Temperature, Variable::Humidity]);

        assert_eq!(records.len(), 1);
        assert!(records[0].values.contains_key(&Variable::Humidity));
        assert!(records[0].is_missing(Variable::Humidity));
        assert_eq!(records[0].location.id(), hanoi().id());
    }

    #[test]
    fn test_normalize_short_column_yields_none() {
        let mut raw = RawSeries::new(hanoi())
            .with_column("precipitation_sum", "mm", vec![Some(1.5)]);
        raw.time = vec!["2024-06-01".to_string(), "2024-06-02".to_string()];

        let records = normalize(raw, &[Variable::Precipitation]);
        assert_eq!(records[0].get(Variable::Precipitation), Some(1.5));
        assert_eq!(records[1].get(Variable::Precipitation), None);
    }
}
