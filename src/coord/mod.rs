//! Coordinates and the distance engine
//!
//! This module handles:
//! - The `Coordinates` value type
//! - Great-circle distance and the "nearby" radius rule
//! - Best-effort parsing of coordinates out of free-text location strings

pub mod distance;
pub mod parse;

pub use distance::{distance_km, is_nearby, listing_distance_km};
pub use parse::parse_location_string;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic coordinate (latitude, longitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Create new coordinates
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validate that coordinates are within valid ranges
    ///
    /// Latitude: -90 to 90
    /// Longitude: -180 to 180
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(crate::error::Error::InvalidCoordinates(format!(
                "Latitude {} is out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(crate::error::Error::InvalidCoordinates(format!(
                "Longitude {} is out of range [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }

    /// True if both components are within range
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Renders the `"<lat>, <lng>"` form stored in listing and profile locations
impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Coordinates::new(9.0105, 38.7645).validate().is_ok());
        assert!(Coordinates::new(90.0, -180.0).validate().is_ok());
        assert!(Coordinates::new(90.5, 0.0).validate().is_err());
        assert!(Coordinates::new(0.0, 180.1).validate().is_err());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_display() {
        let coords = Coordinates::new(9.0, -38.5);
        assert_eq!(coords.to_string(), "9.000000, -38.500000");
    }
}
