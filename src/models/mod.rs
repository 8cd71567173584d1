//! Data models for weatherdash
//!
//! - Location: geographic coordinates, identity and metadata
//! - Record: normalized weather records keyed by canonical variables

pub mod location;
pub mod record;

pub use location::{Location, LocationId};
pub use record::{Variable, WeatherRecord};
