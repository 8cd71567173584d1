//! Open-Meteo forecast, archive and geocoding client

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Mode, RawSeries, WeatherSource, validate_date_range};
use crate::config::WeatherConfig;
use crate::models::Location;
use crate::{Result, WeatherError};

const USER_AGENT: &str = concat!("weatherdash/", env!("CARGO_PKG_VERSION"));

/// Client for the Open-Meteo APIs. One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl OpenMeteoClient {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn request_url(&self, location: &Location, mode: Mode) -> String {
        let common = format!(
            "latitude={}&longitude={}&timezone={}&wind_speed_unit=kmh&temperature_unit=celsius&precipitation_unit=mm",
            location.latitude,
            location.longitude,
            urlencoding::encode(&self.config.timezone),
        );
        let fields = mode.api_fields().join(",");
        match mode {
            Mode::Current => format!(
                "{}/forecast?{common}&current={fields}&forecast_days=1",
                self.config.base_url.trim_end_matches('/')
            ),
            Mode::Forecast { days } => format!(
                "{}/forecast?{common}&daily={fields}&forecast_days={}",
                self.config.base_url.trim_end_matches('/'),
                days.clamp(1, super::MAX_FORECAST_DAYS)
            ),
            Mode::Historical { start, end } => format!(
                "{}/archive?{common}&daily={fields}&start_date={start}&end_date={end}",
                self.config.archive_url.trim_end_matches('/')
            ),
        }
    }

    #[tracing::instrument(name = "open_meteo_request", level = "debug", skip(self))]
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                WeatherError::network(format!(
                    "request timed out after {}s",
                    self.config.timeout_seconds
                ))
            } else {
                WeatherError::network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(WeatherError::rate_limit(
                "weather service answered 429 Too Many Requests",
                retry_after,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::network(format!("failed to read response body: {e}")))?;

        if status == StatusCode::BAD_REQUEST {
            let reason = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.reason)
                .unwrap_or(body);
            let lowered = reason.to_lowercase();
            if lowered.contains("latitude") || lowered.contains("longitude") {
                return Err(WeatherError::invalid_location(reason));
            }
            return Err(WeatherError::validation(reason));
        }
        if !status.is_success() {
            return Err(WeatherError::api(format!(
                "weather service answered {status}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| WeatherError::api(format!("failed to parse response: {e}")))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_raw(&self, location: &Location, mode: Mode) -> Result<RawSeries> {
        location.validate()?;
        if let Mode::Historical { start, end } = mode {
            validate_date_range(start, end, Utc::now().date_naive())?;
        }

        let url = self.request_url(location, mode);
        tracing::debug!(mode = %mode.label(), location = %location.id(), "Fetching weather data");
        let response: ForecastResponse = self.get_json(&url).await?;

        let mut raw = match mode {
            Mode::Current => {
                let block = response
                    .current
                    .ok_or_else(|| WeatherError::api("response has no 'current' block"))?;
                current_to_raw(block, response.current_units, location.clone())
            }
            Mode::Forecast { .. } | Mode::Historical { .. } => {
                let block = response
                    .daily
                    .ok_or_else(|| WeatherError::api("response has no 'daily' block"))?;
                daily_to_raw(block, response.daily_units, location.clone())?
            }
        };
        raw.utc_offset_seconds = response.utc_offset_seconds;
        tracing::debug!(rows = raw.time.len(), "Received weather data");
        Ok(raw)
    }

    async fn geocode(&self, name: &str) -> Result<Vec<Location>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WeatherError::validation("location name is empty"));
        }
        let url = format!(
            "{}/search?name={}&count=10&language={}&format=json",
            self.config.geocoding_url.trim_end_matches('/'),
            urlencoding::encode(name),
            urlencoding::encode(&self.config.language),
        );

        let response: GeocodingResponse = self.get_json(&url).await?;
        let locations: Vec<Location> = response
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Location::from)
            .collect();

        if locations.is_empty() {
            return Err(WeatherError::invalid_location(format!(
                "no place named '{name}' found"
            )));
        }
        Ok(locations)
    }
}

/// Forecast and archive share one response shape
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    current_units: BTreeMap<String, String>,
    #[serde(default)]
    daily: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    daily_units: BTreeMap<String, String>,
    #[serde(default)]
    utc_offset_seconds: i32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    admin1: Option<String>,
}

impl From<GeocodingResult> for Location {
    fn from(result: GeocodingResult) -> Self {
        let name = match result.admin1 {
            Some(region) if region != result.name => format!("{}, {region}", result.name),
            _ => result.name,
        };
        Location {
            latitude: result.latitude,
            longitude: result.longitude,
            name,
            country: result.country,
        }
    }
}

fn current_to_raw(
    block: BTreeMap<String, serde_json::Value>,
    units: BTreeMap<String, String>,
    location: Location,
) -> RawSeries {
    let mut raw = RawSeries::new(location);
    for (field, value) in block {
        match field.as_str() {
            "time" => raw.time = value.as_str().map(str::to_string).into_iter().collect(),
            "interval" => {}
            _ => {
                raw.columns.insert(field, vec![value.as_f64()]);
            }
        }
    }
    raw.units = units;
    raw
}

fn daily_to_raw(
    block: BTreeMap<String, serde_json::Value>,
    units: BTreeMap<String, String>,
    location: Location,
) -> Result<RawSeries> {
    let mut raw = RawSeries::new(location);
    for (field, value) in block {
        let serde_json::Value::Array(items) = value else {
            return Err(WeatherError::api(format!(
                "daily field '{field}' is not an array"
            )));
        };
        if field == "time" {
            raw.time = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        } else {
            raw.columns
                .insert(field, items.iter().map(serde_json::Value::as_f64).collect());
        }
    }
    raw.units = units;
    Ok(raw)
}
