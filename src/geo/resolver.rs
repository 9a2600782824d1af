//! Viewer location resolution
//!
//! Fallback chain, first success wins:
//! 1. A fresh, high-accuracy fix from the positioning capability, bounded by a timeout
//! 2. Coordinates parsed from the viewer's profile location
//! 3. The home city center
//!
//! Resolution never fails. Each call re-runs the whole chain.

use crate::config::Config;
use crate::constants::geo::{HOME_CITY_LAT, HOME_CITY_LNG};
use crate::coord::{parse_location_string, Coordinates};
use crate::geo::{LocationSource, PositionError, PositionRequest, Positioning, ResolvedLocation};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for the resolver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeolocationSettings {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Last resort when neither a fix nor the profile yields coordinates
    pub default_location: Coordinates,
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl GeolocationSettings {
    /// Settings from config; an out-of-range default location falls back to
    /// the home city
    pub fn from_config(config: &Config) -> Self {
        let mut default_location =
            Coordinates::new(config.geolocation.default_lat, config.geolocation.default_lng);
        if let Err(e) = default_location.validate() {
            warn!("Ignoring configured default location: {}", e);
            default_location = Coordinates::new(HOME_CITY_LAT, HOME_CITY_LNG);
        }

        Self {
            high_accuracy: config.geolocation.high_accuracy,
            timeout: Duration::from_secs(config.geolocation.timeout_secs),
            default_location,
        }
    }
}

/// Resolves the viewer coordinate through the fallback chain
#[derive(Clone)]
pub struct GeolocationResolver {
    positioning: Arc<dyn Positioning>,
    settings: GeolocationSettings,
}

impl GeolocationResolver {
    pub fn new(positioning: Arc<dyn Positioning>, settings: GeolocationSettings) -> Self {
        Self {
            positioning,
            settings,
        }
    }

    pub fn settings(&self) -> &GeolocationSettings {
        &self.settings
    }

    /// Resolve the viewer coordinate
    ///
    /// # Arguments
    /// * `profile_location` - The viewer's profile location text, if any
    pub async fn resolve(&self, profile_location: Option<&str>) -> ResolvedLocation {
        match self.precise_fix().await {
            Ok(coordinate) => {
                info!("Got precise location: {}", coordinate);
                return ResolvedLocation {
                    coordinate,
                    source: LocationSource::PreciseGeolocation,
                };
            }
            Err(e) => {
                warn!("Could not get precise location from {}: {}", self.positioning.name(), e);
            }
        }

        if let Some(coordinate) = parse_location_string(profile_location) {
            info!("Using profile location: {}", coordinate);
            return ResolvedLocation {
                coordinate,
                source: LocationSource::ProfileFallback,
            };
        }

        info!("Using default location: {}", self.settings.default_location);
        ResolvedLocation {
            coordinate: self.settings.default_location,
            source: LocationSource::DefaultFallback,
        }
    }

    async fn precise_fix(&self) -> Result<Coordinates, PositionError> {
        let request = PositionRequest {
            high_accuracy: self.settings.high_accuracy,
            timeout: self.settings.timeout,
        };

        let fix = tokio::time::timeout(
            self.settings.timeout,
            self.positioning.current_position(request),
        )
        .await
        .map_err(|_| PositionError::Timeout)??;

        if !fix.is_valid() {
            return Err(PositionError::Unavailable(format!(
                "Fix {} is out of range",
                fix
            )));
        }

        Ok(fix)
    }
}
