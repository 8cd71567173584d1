//! Location Resolution Module
//!
//! Turns user input (a preset name, "lat,lon" coordinates or a free-form
//! place name) into a [`Location`].

use tracing::debug;

use crate::models::Location;
use crate::weather::WeatherSource;
use crate::{Result, WeatherError};

/// Parsed location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Coordinates (latitude, longitude)
    Coordinates(f64, f64),
    /// Location name (city, region, etc.)
    Name(String),
}

pub struct LocationParser;

impl LocationParser {
    /// Parse location input. Anything that is not a valid coordinate pair is
    /// treated as a name.
    pub fn parse(input: &str) -> Result<LocationInput> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WeatherError::validation("location must not be empty"));
        }

        if let Some((lat, lon)) = Self::parse_coordinates(input) {
            return Ok(LocationInput::Coordinates(lat, lon));
        }
        Ok(LocationInput::Name(input.to_string()))
    }

    /// Parse coordinates from strings like "16.0471,108.2068" or "16.0471 108.2068"
    fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        let [lat, lon] = parts.as_slice() else {
            return None;
        };

        let lat = lat.parse::<f64>().ok()?;
        let lon = lon.parse::<f64>().ok()?;
        let location = Location::new(lat, lon, "");
        location.validate().ok()?;
        Some((lat, lon))
    }
}

/// Service for resolving location inputs
pub struct LocationResolver;

impl LocationResolver {
    /// Resolve input against presets first, then coordinates, then geocoding
    pub async fn resolve<W: WeatherSource + ?Sized>(
        source: &W,
        presets: &[Location],
        input: &str,
    ) -> Result<Location> {
        debug!("Resolving location input: {input}");

        let location = match LocationParser::parse(input)? {
            LocationInput::Coordinates(lat, lon) => Self::resolve_coordinates(presets, lat, lon),
            LocationInput::Name(name) => Self::resolve_name(source, presets, &name).await?,
        };

        debug!(
            "Resolved location: {} at ({}, {})",
            location.name, location.latitude, location.longitude
        );
        Ok(location)
    }

    /// Coordinates keep a preset's name when they match its identity
    fn resolve_coordinates(presets: &[Location], lat: f64, lon: f64) -> Location {
        let candidate = Location::new(lat, lon, format!("{lat:.4}, {lon:.4}"));
        let id = candidate.id();
        presets
            .iter()
            .find(|p| p.id() == id)
            .map_or(candidate, |preset| Location {
                latitude: lat,
                longitude: lon,
                ..preset.clone()
            })
    }

    async fn resolve_name<W: WeatherSource + ?Sized>(
        source: &W,
        presets: &[Location],
        name: &str,
    ) -> Result<Location> {
        if let Some(preset) = presets
            .iter()
            .find(|p| p.name.to_lowercase() == name.to_lowercase())
        {
            debug!("Matched preset location: {}", preset.name);
            return Ok(preset.clone());
        }

        debug!("Geocoding location name: {name}");
        source
            .geocode(name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::invalid_location(format!("Location not found: {name}")))
    }
}
