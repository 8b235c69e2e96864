//! Geometry utilities for route analysis.
//!
//! Great-circle distances, named bounding boxes used to partition routes,
//! the spherical-cap area estimate of a lat/lon rectangle, and the minimum
//! rotated rectangle of a set of stops.

use geo::{Area, MinimumRotatedRect, MultiPoint, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use utoipa::ToSchema;

use crate::domain::Location;

/// Earth radius in kilometers for haversine calculation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two points given in decimal degrees.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::geometry::haversine;
///
/// // 1 degree of longitude at the equator is about 111 km
/// let d = haversine(0.0, 0.0, 0.0, 1.0);
/// assert!((d - 111.19).abs() < 0.1);
///
/// assert_eq!(haversine(40.0, -75.0, 40.0, -75.0), 0.0);
/// ```
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Area estimate in km² of the lat/lon rectangle spanned by the given bounds.
///
/// Uses `4πR² · |Δsin(lat)| · |Δlon| / (2π)`, a spherical-cap approximation
/// rather than an exact spherical polygon area.
pub fn cap_area_km2(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> f64 {
    let dsin = (lat_max.to_radians().sin() - lat_min.to_radians().sin()).abs();
    let dlon = (lon_max - lon_min).to_radians().abs();
    4.0 * PI * EARTH_RADIUS_KM.powi(2) * dsin * dlon / (2.0 * PI)
}

/// A named lat/lon rectangle used to partition routes geographically.
///
/// Corners are normalized so that `lat_min <= lat_max` and `lon_min <= lon_max`
/// whatever order they are given in.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::geometry::BoundingBox;
/// use last_mile_analyzer::domain::Location;
///
/// let bbox = BoundingBox::new("TestBox", 20.0, 10.0, 30.0, 40.0);
/// assert_eq!(bbox.lat_min, 10.0);
/// assert_eq!(bbox.lat_max, 20.0);
/// assert!(bbox.contains(Location::new(15.0, 35.0)));
/// assert!(!bbox.contains(Location::new(25.0, 35.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub name: String,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Creates a bounding box from two latitudes and two longitudes.
    pub fn new(name: impl Into<String>, lat1: f64, lat2: f64, lon1: f64, lon2: f64) -> Self {
        Self {
            name: name.into(),
            lat_min: lat1.min(lat2),
            lat_max: lat1.max(lat2),
            lon_min: lon1.min(lon2),
            lon_max: lon1.max(lon2),
        }
    }

    /// Returns true if the location lies inside the box (edges included).
    pub fn contains(&self, location: Location) -> bool {
        (self.lat_min..=self.lat_max).contains(&location.lat)
            && (self.lon_min..=self.lon_max).contains(&location.lon)
    }

    /// Spherical-cap area estimate in km².
    pub fn area_km2(&self) -> f64 {
        cap_area_km2(self.lat_min, self.lat_max, self.lon_min, self.lon_max)
    }
}

/// Minimum-area rotated rectangle enclosing the given locations.
///
/// Coordinates are planar degrees (x = longitude, y = latitude). Returns
/// `None` for fewer than three distinct points, where no hull exists.
pub fn minimum_rotated_rectangle(locations: &[Location]) -> Option<Polygon<f64>> {
    if locations.len() < 3 {
        return None;
    }
    let points: MultiPoint<f64> = locations
        .iter()
        .map(|l| Point::new(l.lon, l.lat))
        .collect::<Vec<_>>()
        .into();
    points.minimum_rotated_rect()
}

/// Area in degrees² of the minimum rotated rectangle, 0 when none exists.
pub fn minimum_rotated_rectangle_area(locations: &[Location]) -> f64 {
    minimum_rotated_rectangle(locations)
        .map(|rect| rect.unsigned_area())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: f64, expected: f64, rel: f64) -> bool {
        (actual - expected).abs() <= expected.abs() * rel
    }

    #[test]
    fn test_haversine_same_point() {
        assert_eq!(haversine(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(haversine(-33.9, 151.2, -33.9, 151.2), 0.0);
    }

    #[test]
    fn test_haversine_known_distances() {
        // New York to Los Angeles
        assert!(approx(haversine(40.7128, -74.0060, 34.0522, -118.2437), 3940.0, 0.1));
        assert!(approx(haversine(0.0, 0.0, 0.0, 1.0), 111.32, 0.1));
        // Pole to pole
        assert!(approx(haversine(90.0, 0.0, -90.0, 0.0), 20015.0, 0.1));
    }

    #[test]
    fn test_haversine_symmetric_and_non_negative() {
        let pairs = [
            ((39.95, -75.16), (40.71, -74.01)),
            ((-22.9, -43.2), (51.5, -0.12)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = haversine(lat1, lon1, lat2, lon2);
            let ba = haversine(lat2, lon2, lat1, lon1);
            assert!(ab >= 0.0);
            assert!((ab - ba).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cap_area_degenerate_is_zero() {
        assert_eq!(cap_area_km2(10.0, 10.0, 20.0, 30.0), 0.0);
        assert_eq!(cap_area_km2(10.0, 11.0, 20.0, 20.0), 0.0);
    }

    #[test]
    fn test_cap_area_matches_formula() {
        let area = cap_area_km2(0.0, 1.0, 0.0, 1.0);
        let expected = 2.0 * EARTH_RADIUS_KM.powi(2) * 1f64.to_radians().sin() * 1f64.to_radians();
        assert!((area - expected).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box_initialization() {
        let bbox = BoundingBox::new("TestBox", 10.0, 20.0, 30.0, 40.0);
        assert_eq!(bbox.name, "TestBox");
        assert_eq!(bbox.lat_min, 10.0);
        assert_eq!(bbox.lat_max, 20.0);
        assert_eq!(bbox.lon_min, 30.0);
        assert_eq!(bbox.lon_max, 40.0);
    }

    #[test]
    fn test_bounding_box_contains_edges() {
        let bbox = BoundingBox::new("Edges", 0.0, 1.0, 0.0, 1.0);
        assert!(bbox.contains(Location::new(0.0, 0.0)));
        assert!(bbox.contains(Location::new(1.0, 1.0)));
        assert!(!bbox.contains(Location::new(1.0001, 0.5)));
    }

    #[test]
    fn test_minimum_rotated_rectangle_of_square() {
        let square = [
            Location::new(0.0, 0.0),
            Location::new(0.0, 1.0),
            Location::new(1.0, 1.0),
            Location::new(1.0, 0.0),
        ];
        let area = minimum_rotated_rectangle_area(&square);
        assert!((area - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_rotated_rectangle_needs_three_points() {
        let pair = [Location::new(0.0, 0.0), Location::new(1.0, 1.0)];
        assert!(minimum_rotated_rectangle(&pair).is_none());
        assert_eq!(minimum_rotated_rectangle_area(&pair), 0.0);
    }
}
