//! IP-based positioning
//!
//! Uses ip-api.com as the positioning capability for hosts without a GPS
//! (the CLI and the HTTP server). Every call hits the API; results are never
//! cached.

use crate::constants::api::IP_API_URL;
use crate::coord::Coordinates;
use crate::geo::{PositionError, PositionRequest, Positioning};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// IP geolocation positioning capability
#[derive(Debug, Clone)]
pub struct IpPositioning {
    client: reqwest::Client,
    url: String,
}

/// ip-api.com response
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

impl IpPositioning {
    /// Create a positioning capability against ip-api.com
    pub fn new() -> Self {
        Self::with_url(IP_API_URL)
    }

    /// Create a positioning capability against a compatible endpoint
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Turn an API response into coordinates
    fn coordinates_from(data: IpApiResponse) -> Result<Coordinates, PositionError> {
        if data.status != "success" {
            return Err(PositionError::Unavailable(
                data.message
                    .unwrap_or_else(|| "IP location lookup failed".to_string()),
            ));
        }

        let lat = data
            .lat
            .ok_or_else(|| PositionError::Unavailable("No latitude in response".to_string()))?;
        let lng = data
            .lon
            .ok_or_else(|| PositionError::Unavailable("No longitude in response".to_string()))?;

        debug!(
            "IP location resolved near {}",
            data.city.as_deref().unwrap_or("unknown city")
        );

        Ok(Coordinates::new(lat, lng))
    }
}

impl Default for IpPositioning {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Positioning for IpPositioning {
    fn name(&self) -> &'static str {
        "ip-api"
    }

    /// IP lookups have a single accuracy level, so `high_accuracy` is ignored
    async fn current_position(
        &self,
        request: PositionRequest,
    ) -> Result<Coordinates, PositionError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PositionError::Timeout
                } else {
                    PositionError::Unavailable(format!("IP location request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(PositionError::Unavailable(format!(
                "IP location API returned status: {}",
                response.status()
            )));
        }

        let data: IpApiResponse = response.json().await.map_err(|e| {
            PositionError::Unavailable(format!("Failed to parse IP location response: {}", e))
        })?;

        Self::coordinates_from(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> IpApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_success_response() {
        let data = parse(
            r#"{"status":"success","country":"Ethiopia","city":"Addis Ababa","lat":9.0249,"lon":38.7469}"#,
        );
        let coords = IpPositioning::coordinates_from(data).unwrap();
        assert_eq!(coords, Coordinates::new(9.0249, 38.7469));
    }

    #[test]
    fn test_fail_response() {
        let data = parse(r#"{"status":"fail","message":"private range"}"#);
        assert_eq!(
            IpPositioning::coordinates_from(data),
            Err(PositionError::Unavailable("private range".to_string()))
        );
    }

    #[test]
    fn test_missing_coordinates() {
        let data = parse(r#"{"status":"success","lat":9.0}"#);
        assert!(IpPositioning::coordinates_from(data).is_err());
    }

    #[test]
    fn test_positioning_creation() {
        let positioning = IpPositioning::new();
        assert_eq!(positioning.name(), "ip-api");
        assert_eq!(positioning.url, IP_API_URL);
    }
}
