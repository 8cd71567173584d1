//! Configuration management for weatherdash
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherError;
use crate::analysis::AlertThresholds;
use crate::cache::FreshnessPolicy;
use crate::models::Location;
use ::config::{Config, Environment, File};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Weather API configuration
    pub weather: WeatherConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Alert thresholds
    pub alerts: AlertThresholds,
    /// Default application settings
    pub defaults: DefaultsConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of the forecast API
    pub base_url: String,
    /// Base URL of the historical archive API
    pub archive_url: String,
    /// Base URL of the geocoding API
    pub geocoding_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    /// Timezone used to cut daily values ("auto" lets the API pick)
    pub timezone: String,
    /// Language for geocoding results
    pub language: String,
    /// Location used when a request does not name one
    pub default_location: LocationConfig,
}

/// A named coordinate pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&LocationConfig> for Location {
    fn from(value: &LocationConfig) -> Self {
        Location::new(value.latitude, value.longitude, value.name.clone())
    }
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory location
    pub location: String,
    /// How long current conditions stay fresh, in minutes
    pub current_ttl_minutes: u32,
    /// How long forecasts stay fresh, in hours
    pub forecast_ttl_hours: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

/// Default application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Forecast length when none is requested
    pub forecast_days: u32,
    /// History window when no dates are requested
    pub history_days: u32,
    /// Preset locations for the comparison view
    pub locations: Vec<LocationConfig>,
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_archive_url() -> String {
    "https://archive-api.open-meteo.com/v1".to_string()
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_cache_location() -> String {
    "~/.cache/weatherdash".to_string()
}

fn preset(name: &str, latitude: f64, longitude: f64) -> LocationConfig {
    LocationConfig {
        name: name.to_string(),
        latitude,
        longitude,
    }
}

fn default_locations() -> Vec<LocationConfig> {
    vec![
        preset("Hà Nội", 21.0278, 105.8342),
        preset("TP.HCM", 10.8231, 106.6297),
        preset("Đà Nẵng", 16.0471, 108.2068),
        preset("Huế", 16.4637, 107.5909),
        preset("Cần Thơ", 10.0452, 105.7469),
    ]
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            archive_url: default_archive_url(),
            geocoding_url: default_geocoding_url(),
            timeout_seconds: 30,
            timezone: "auto".to_string(),
            language: "en".to_string(),
            default_location: preset("Hà Nội", 21.0278, 105.8342),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
            current_ttl_minutes: 15,
            forecast_ttl_hours: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            forecast_days: 7,
            history_days: 30,
            locations: default_locations(),
        }
    }
}

impl WeatherConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl CacheConfig {
    /// Cache directory with a leading `~` expanded to the home directory
    #[must_use]
    pub fn resolved_location(&self) -> PathBuf {
        match self.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(rest)),
            None => PathBuf::from(&self.location),
        }
    }

    #[must_use]
    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy {
            current: Duration::from_secs(u64::from(self.current_ttl_minutes) * 60),
            forecast: Duration::from_secs(u64::from(self.forecast_ttl_hours) * 60 * 60),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(::config::FileFormat::Toml),
            );
        }

        // WEATHERDASH_ALERTS__HEAT=37 overrides alerts.heat
        builder = builder.add_source(
            Environment::with_prefix("WEATHERDASH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weatherdash").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.alerts
            .validate()
            .map_err(|e| WeatherError::config(e.to_string()))?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds == 0 || self.weather.timeout_seconds > 300 {
            return Err(WeatherError::config(
                "Weather API timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.cache.current_ttl_minutes == 0 || self.cache.current_ttl_minutes > 24 * 60 {
            return Err(WeatherError::config(
                "Current conditions TTL must be between 1 minute and 24 hours",
            )
            .into());
        }

        if self.cache.forecast_ttl_hours == 0 || self.cache.forecast_ttl_hours > 168 {
            return Err(
                WeatherError::config("Forecast TTL must be between 1 and 168 hours").into(),
            );
        }

        if !(1..=16).contains(&self.defaults.forecast_days) {
            return Err(
                WeatherError::config("Default forecast days must be between 1 and 16").into(),
            );
        }

        if self.defaults.history_days == 0 {
            return Err(WeatherError::config("Default history window cannot be empty").into());
        }

        let presets = self
            .defaults
            .locations
            .iter()
            .chain(std::iter::once(&self.weather.default_location));
        for preset in presets {
            Location::from(preset).validate().map_err(|e| {
                WeatherError::config(format!("Preset location '{}': {e}", preset.name))
            })?;
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            &self.weather.base_url,
            &self.weather.archive_url,
            &self.weather.geocoding_url,
        ];
        if urls
            .iter()
            .any(|url| !url.starts_with("http://") && !url.starts_with("https://"))
        {
            return Err(WeatherError::config(
                "Weather API URLs must be valid HTTP or HTTPS URLs",
            )
            .into());
        }

        Ok(())
    }
}
