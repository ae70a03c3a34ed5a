//! # Geographic Utilities
//!
//! Distance and coordinate helpers shared by the segmenter, the fare attributor,
//! the consolidation pass and the reference probe.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`is_within`] | Strict tolerance test used for reference-point matching |
//! | [`compute_center`] | Arithmetic mean of a set of GPS points |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`offset_meters`] | Move a point by a north/east offset in meters |
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use the haversine formula on a sphere of radius [`EARTH_RADIUS_M`]
//! (6,371,000 m). `geo`'s mean Earth radius differs slightly and is not used
//! for reference matching.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).

use geo::{Centroid, MultiPoint, Point};
use crate::GpsPoint;

/// Earth radius used by every distance computation in this crate.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (assuming a spherical Earth
/// with radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use apc_fare_zones::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let delta_lat = (p2.latitude - p1.latitude).to_radians();
    let delta_lng = (p2.longitude - p1.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// True when `point` lies strictly closer than `tolerance_m` to `reference`.
///
/// The comparison is `<`, not `<=`: a stop exactly on the tolerance radius
/// does not match.
#[inline]
pub fn is_within(point: &GpsPoint, reference: &GpsPoint, tolerance_m: f64) -> bool {
    haversine_distance(point, reference) < tolerance_m
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Returns a single value suitable for square search envelopes. The value is
/// conservative (larger than the true latitude span) so envelope queries never
/// miss a candidate that the exact haversine check would accept.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    // At the equator, 1 degree ≈ 111,320 meters
    // This decreases with cos(latitude) for longitude
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

/// Move a point by `north_m` meters along the meridian and `east_m` meters along the parallel.
///
/// The northward component is exact on the haversine sphere; the eastward
/// component is a local approximation, fine for offsets of a few hundred meters.
///
/// # Example
///
/// ```rust
/// use apc_fare_zones::{GpsPoint, geo_utils};
///
/// let origin = GpsPoint::new(-30.0788, -51.1167);
/// let moved = geo_utils::offset_meters(&origin, 49.9, 0.0);
/// assert!(geo_utils::is_within(&moved, &origin, 50.0));
/// ```
pub fn offset_meters(point: &GpsPoint, north_m: f64, east_m: f64) -> GpsPoint {
    let lat = point.latitude + (north_m / EARTH_RADIUS_M).to_degrees();
    let lng_scale = EARTH_RADIUS_M * point.latitude.to_radians().cos().max(1e-9);
    let lng = point.longitude + (east_m / lng_scale).to_degrees();
    GpsPoint::new(lat, lng)
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Compute the geographic center (centroid) of a set of GPS points.
///
/// Returns the arithmetic mean of all latitude and longitude values, or `None`
/// for empty input. Intended for clusters spanning a few meters, where plain
/// averaging is exact enough.
///
/// # Example
///
/// ```rust
/// use apc_fare_zones::{GpsPoint, geo_utils};
///
/// let points = vec![
///     GpsPoint::new(-30.10, -51.10),
///     GpsPoint::new(-30.12, -51.12),
/// ];
///
/// let center = geo_utils::compute_center(&points).unwrap();
/// assert!((center.latitude - (-30.11)).abs() < 1e-9);
/// assert!((center.longitude - (-51.11)).abs() < 1e-9);
/// ```
pub fn compute_center(points: &[GpsPoint]) -> Option<GpsPoint> {
    let multi: MultiPoint<f64> = points
        .iter()
        .map(|p| Point::new(p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .into();

    multi.centroid().map(|c| GpsPoint::new(c.y(), c.x()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(-30.078786, -51.116670);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = GpsPoint::new(-30.078786, -51.116670);
        let b = GpsPoint::new(-30.094485, -51.079701);
        assert!(approx_eq(haversine_distance(&a, &b), haversine_distance(&b, &a), 1e-9));
    }

    #[test]
    fn test_offset_north_is_exact() {
        let origin = GpsPoint::new(-30.079075, -51.116130);
        let moved = offset_meters(&origin, 120.0, 0.0);
        assert!(approx_eq(haversine_distance(&origin, &moved), 120.0, 1e-6));
    }

    #[test]
    fn test_offset_east_is_close() {
        let origin = GpsPoint::new(-30.079075, -51.116130);
        let moved = offset_meters(&origin, 0.0, 30.0);
        assert!(approx_eq(haversine_distance(&origin, &moved), 30.0, 0.01));
    }

    #[test]
    fn test_is_within_is_strict() {
        let origin = GpsPoint::new(-30.0, -51.0);
        assert!(is_within(&offset_meters(&origin, 49.9, 0.0), &origin, 50.0));
        assert!(!is_within(&offset_meters(&origin, 50.1, 0.0), &origin, 50.0));
    }

    #[test]
    fn test_compute_center_empty() {
        let empty: Vec<GpsPoint> = vec![];
        assert!(compute_center(&empty).is_none());
    }

    #[test]
    fn test_compute_center_single() {
        let p = GpsPoint::new(-30.05, -51.15);
        let center = compute_center(&[p]).unwrap();
        assert!(approx_eq(center.latitude, p.latitude, 1e-12));
        assert!(approx_eq(center.longitude, p.longitude, 1e-12));
    }

    #[test]
    fn test_meters_to_degrees() {
        // At equator, 111km = 1 degree
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));

        // At higher latitude, same distance = more degrees
        let deg_30 = meters_to_degrees(111_320.0, -30.0);
        assert!(deg_30 > 1.0);
    }
}
