//! Centralized constants for the mella-feed crate
//!
//! This module consolidates constants that are used across multiple modules
//! to avoid duplication and ensure consistency.

/// Geographic constants
pub mod geo {
    /// Mean Earth radius in kilometers
    pub const EARTH_RADIUS_KM: f64 = 6371.0;

    /// Addis Ababa city center, the last resort viewer location
    pub const HOME_CITY_LAT: f64 = 9.0105;
    pub const HOME_CITY_LNG: f64 = 38.7645;
}

/// External API endpoints
pub mod api {
    /// IP geolocation API (free, no key required)
    pub const IP_API_URL: &str = "http://ip-api.com/json";

    /// Path prefix of the hosted table store's REST interface
    pub const REST_PATH: &str = "rest/v1";
}
