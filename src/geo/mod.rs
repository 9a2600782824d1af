//! Viewer geolocation
//!
//! Provides the positioning capability abstraction, its implementations, and
//! the resolver that turns them into a guaranteed viewer coordinate.

pub mod ip_location;
pub mod resolver;

pub use resolver::{GeolocationResolver, GeolocationSettings};

use crate::coord::Coordinates;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Parameters of a single positioning request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRequest {
    /// Prefer the most accurate source available
    pub high_accuracy: bool,
    /// Upper bound on how long the fix may take
    pub timeout: Duration,
}

/// Why a positioning request produced no fix
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Positioning timed out")]
    Timeout,

    #[error("Permission to read the position was denied")]
    PermissionDenied,
}

/// Trait for positioning capabilities
///
/// Every call must take a fresh fix; implementations must not answer from a
/// cache, so that a manual refresh reflects movement.
#[async_trait]
pub trait Positioning: Send + Sync {
    /// Short name for logs (e.g., "ip-api", "static")
    fn name(&self) -> &'static str;

    /// Obtain the current position
    async fn current_position(
        &self,
        request: PositionRequest,
    ) -> Result<Coordinates, PositionError>;
}

/// Where the viewer coordinate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// A fresh fix from the positioning capability
    PreciseGeolocation,
    /// Coordinates parsed from the viewer's profile location
    ProfileFallback,
    /// The home city center
    DefaultFallback,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreciseGeolocation => write!(f, "precise_geolocation"),
            Self::ProfileFallback => write!(f, "profile_fallback"),
            Self::DefaultFallback => write!(f, "default_fallback"),
        }
    }
}

/// Outcome of one resolution round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinate: Coordinates,
    pub source: LocationSource,
}

/// Positioning capability pinned to a fixed coordinate
///
/// Used when the host already knows where the viewer is (e.g., `--lat/--lng`).
#[derive(Debug, Clone, Copy)]
pub struct StaticPositioning {
    coordinate: Coordinates,
}

impl StaticPositioning {
    pub fn new(coordinate: Coordinates) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl Positioning for StaticPositioning {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn current_position(
        &self,
        _request: PositionRequest,
    ) -> Result<Coordinates, PositionError> {
        Ok(self.coordinate)
    }
}

/// Positioning capability that never has a fix
///
/// Forces the resolver onto its fallbacks, e.g. when the host disables
/// location access.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPositioning;

#[async_trait]
impl Positioning for DisabledPositioning {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn current_position(
        &self,
        _request: PositionRequest,
    ) -> Result<Coordinates, PositionError> {
        Err(PositionError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_location_serialization() {
        let resolved = ResolvedLocation {
            coordinate: Coordinates::new(9.01, 38.76),
            source: LocationSource::ProfileFallback,
        };

        let json = serde_json::to_value(resolved).unwrap();
        assert_eq!(json["source"], "profile_fallback");
        assert_eq!(json["coordinate"]["lat"], 9.01);
    }

    #[tokio::test]
    async fn test_static_positioning() {
        let positioning = StaticPositioning::new(Coordinates::new(1.5, 2.5));
        let request = PositionRequest {
            high_accuracy: true,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(
            positioning.current_position(request).await,
            Ok(Coordinates::new(1.5, 2.5))
        );
        assert_eq!(
            DisabledPositioning.current_position(request).await,
            Err(PositionError::PermissionDenied)
        );
    }
}
