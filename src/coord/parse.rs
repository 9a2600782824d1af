//! Coordinate extraction from free-text location strings
//!
//! Listing and profile `location` fields hold either an address typed by a
//! person ("Bole, Addis Ababa") or a serialized coordinate pair
//! ("9.0105, 38.7645"). Only the second form yields coordinates.

use crate::coord::Coordinates;
use regex::Regex;
use std::sync::LazyLock;

/// Signed decimal pair separated by a comma. Both parts need a fractional
/// component so house numbers and counts in addresses are not mistaken for
/// coordinates.
static COORDINATE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+\.\d+)\s*,\s*(-?\d+\.\d+)").expect("invalid coordinate pair pattern")
});

/// Extract a `lat, lng` pair from a location string
///
/// Returns `None` for missing input, text without a decimal pair, or a pair
/// outside the valid latitude/longitude ranges.
pub fn parse_location_string(s: Option<&str>) -> Option<Coordinates> {
    let captures = COORDINATE_PAIR.captures(s?)?;

    let lat: f64 = captures.get(1)?.as_str().parse().ok()?;
    let lng: f64 = captures.get(2)?.as_str().parse().ok()?;

    let coords = Coordinates::new(lat, lng);
    coords.is_valid().then_some(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_plain_pair() {
        let coords = parse_location_string(Some("9.01,38.76")).unwrap();
        assert_eq!(coords, Coordinates::new(9.01, 38.76));

        let coords = parse_location_string(Some("-33.9249 ,  18.4241")).unwrap();
        assert_eq!(coords, Coordinates::new(-33.9249, 18.4241));
    }

    #[test]
    fn test_parse_embedded_pair() {
        let coords = parse_location_string(Some("Near Meskel Square (9.0105, 38.7645)")).unwrap();
        assert_eq!(coords, Coordinates::new(9.0105, 38.7645));
    }

    #[test]
    fn test_parse_address_is_none() {
        assert!(parse_location_string(Some("Bole, Addis Ababa")).is_none());
        assert!(parse_location_string(Some("House 12, 3 rooms")).is_none());
        assert!(parse_location_string(Some("")).is_none());
        assert!(parse_location_string(None).is_none());
    }

    #[test]
    fn test_parse_out_of_range_is_none() {
        assert!(parse_location_string(Some("95.5, 38.7")).is_none());
        assert!(parse_location_string(Some("9.5, 380.7")).is_none());
    }

    #[test]
    fn test_display_roundtrip() {
        for coords in [
            Coordinates::new(9.0105, 38.7645),
            Coordinates::new(-89.999999, 179.5),
            Coordinates::new(0.0, 0.0),
            Coordinates::new(12.0, -7.25),
        ] {
            let parsed = parse_location_string(Some(&coords.to_string())).unwrap();
            assert_abs_diff_eq!(parsed.lat, coords.lat, epsilon = 1e-6);
            assert_abs_diff_eq!(parsed.lng, coords.lng, epsilon = 1e-6);
        }
    }
}
