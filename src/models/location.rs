//! Location model for geographic coordinates and metadata

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::WeatherError;

/// Decimal places kept when deriving a location's identity
pub const IDENTITY_PRECISION: u32 = 2;

/// Location coordinates
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Location name (city, region, etc.)
    pub name: String,
    /// Country name as reported by the geocoder
    pub country: Option<String>,
}

/// Identity of a location: its coordinates rounded to [`IDENTITY_PRECISION`]
/// decimals, stored as hundredths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId {
    lat_centi: i32,
    lon_centi: i32,
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}:{:.2}",
            f64::from(self.lat_centi) / 100.0,
            f64::from(self.lon_centi) / 100.0
        )
    }
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            name: name.into(),
            country: None,
        }
    }

    /// Create location with country
    #[must_use]
    pub fn with_country(
        latitude: f64,
        longitude: f64,
        name: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            name: name.into(),
            country: Some(country.into()),
        }
    }

    /// Reject coordinates outside the valid lat/lon ranges
    pub fn validate(&self) -> crate::Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(WeatherError::invalid_location(format!(
                "latitude must be between -90 and 90, got {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(WeatherError::invalid_location(format!(
                "longitude must be between -180 and 180, got {}",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates to the given number of decimals
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Identity used for cache keys and for matching records to locations
    #[must_use]
    pub fn id(&self) -> LocationId {
        let multiplier = 10_f64.powi(IDENTITY_PRECISION as i32);
        LocationId {
            lat_centi: (self.latitude * multiplier).round() as i32,
            lon_centi: (self.longitude * multiplier).round() as i32,
        }
    }

    /// Display name, falling back to coordinates when the name is blank
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.format_coordinates()
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_identity_rounds_coordinates() {
        let a = Location::new(21.0278, 105.8342, "Hà Nội");
        let b = Location::new(21.0301, 105.8349, "Hanoi");
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().to_string(), "21.03:105.83");
    }

    #[test]
    fn test_location_identity_distinguishes_cities() {
        let hanoi = Location::new(21.0278, 105.8342, "Hà Nội");
        let hue = Location::new(16.4637, 107.5909, "Huế");
        assert_ne!(hanoi.id(), hue.id());
    }

    #[test]
    fn test_negative_coordinates_identity() {
        let location = Location::new(-33.8688, -151.2093, "Somewhere");
        assert_eq!(location.id().to_string(), "-33.87:-151.21");
    }

    #[test]
    fn test_location_rounded_coordinates() {
        let location = Location::new(46.818_234, 8.227_456, "Test");
        let (lat, lon) = location.rounded_coordinates(2);
        assert_eq!(lat, 46.82);
        assert_eq!(lon, 8.23);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(Location::new(91.0, 0.0, "x").validate().is_err());
        assert!(Location::new(0.0, -181.0, "x").validate().is_err());
        assert!(Location::new(f64::NAN, 0.0, "x").validate().is_err());
        assert!(Location::new(10.0452, 105.7469, "Cần Thơ").validate().is_ok());
    }

    #[test]
    fn test_display_name_falls_back_to_coordinates() {
        let location = Location::new(16.0471, 108.2068, " ");
        assert_eq!(location.display_name(), "16.0471, 108.2068");
    }
}
