//! Great-circle distance
//!
//! The single haversine implementation shared by the resolver, the feed and
//! the HTTP API.

use crate::constants::geo::EARTH_RADIUS_KM;
use crate::coord::{parse_location_string, Coordinates};
use crate::listing::Listing;

/// Calculate the distance between two points in kilometers (Haversine formula)
///
/// # Arguments
/// * `a` - First point
/// * `b` - Second point
///
/// # Returns
/// Distance in kilometers. Symmetric in its arguments and zero when they are equal.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Check whether a distance falls inside the nearby radius
///
/// The boundary is excluded: a listing exactly `radius_km` away is not nearby.
pub fn is_nearby(distance_km: f64, radius_km: f64) -> bool {
    distance_km < radius_km
}

/// Distance from `origin` to a listing's stored location
///
/// Returns `None` when the listing has no location or the location is a
/// free-text address rather than a coordinate pair.
pub fn listing_distance_km(origin: Coordinates, listing: &Listing) -> Option<f64> {
    parse_location_string(listing.location.as_deref()).map(|at| distance_km(origin, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::tests::listing_at;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_distance_identity() {
        let addis = Coordinates::new(9.0105, 38.7645);
        assert_eq!(distance_km(addis, addis), 0.0);

        let pole = Coordinates::new(90.0, 0.0);
        assert_eq!(distance_km(pole, pole), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let points = [
            Coordinates::new(9.0105, 38.7645),
            Coordinates::new(-33.9249, 18.4241),
            Coordinates::new(40.7128, -74.0060),
            Coordinates::new(0.0, 179.9),
            Coordinates::new(0.0, -179.9),
        ];

        for a in points {
            for b in points {
                assert_abs_diff_eq!(distance_km(a, b), distance_km(b, a), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let distance = distance_km(Coordinates::new(9.0, 38.0), Coordinates::new(10.0, 38.0));
        assert_abs_diff_eq!(distance, 111.2, epsilon = 0.5);
    }

    #[test]
    fn test_antimeridian_is_short() {
        // 0.2 degrees of longitude at the equator, across the date line
        let distance = distance_km(Coordinates::new(0.0, 179.9), Coordinates::new(0.0, -179.9));
        assert!(distance < 25.0, "Distance {} should wrap around", distance);
    }

    #[test]
    fn test_is_nearby_boundary() {
        assert!(!is_nearby(10.0, 10.0));
        assert!(is_nearby(9.999, 10.0));
        assert!(!is_nearby(f64::INFINITY, 10.0));
    }

    #[test]
    fn test_listing_distance() {
        let origin = Coordinates::new(9.0, 38.0);

        let listing = listing_at("a", "seller", Some("10.0, 38.0"));
        let distance = listing_distance_km(origin, &listing).unwrap();
        assert_abs_diff_eq!(distance, 111.2, epsilon = 0.5);

        let address = listing_at("b", "seller", Some("Bole, Addis Ababa"));
        assert!(listing_distance_km(origin, &address).is_none());

        let missing = listing_at("c", "seller", None);
        assert!(listing_distance_km(origin, &missing).is_none());
    }
}
