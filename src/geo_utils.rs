//! Geographic computation utilities for GPS track analysis.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS samples |
//! | [`compute_bounds`] | Geographic bounding box of a track |
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees),
//! the standard produced by GPS receivers.

use crate::{Bounds, TrackPoint};
use geo::{Distance, Haversine, Point};

/// Calculate the great-circle distance between two GPS samples using the
/// Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (spherical
/// Earth, radius 6,371 km). Accurate to within ~0.3% for trail-scale
/// distances.
///
/// # Example
///
/// ```rust
/// use trail_profiler::{TrackPoint, geo_utils};
///
/// let london = TrackPoint::new(51.5074, -0.1278, None);
/// let paris = TrackPoint::new(48.8566, 2.3522, None);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 5000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Compute the geographic bounding box of a sequence of coordinates.
///
/// Returns a [`Bounds`] enclosing all (latitude, longitude) pairs. For
/// empty input the bounds carry MIN/MAX sentinels that fail any
/// containment check.
pub fn compute_bounds(latitudes: &[f64], longitudes: &[f64]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for (&lat, &lng) in latitudes.iter().zip(longitudes) {
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
        min_lng = min_lng.min(lng);
        max_lng = max_lng.max(lng);
    }

    Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    }
}
