//! # Geographic Utilities
//!
//! Small set of WGS84 helpers shared by the heatmap engine and the map session.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`bounds_around`] | Square bounding box of a given radius around a center |
//! | [`compute_bounds`] | Bounding box enclosing a set of coordinates |
//!
//! ## Example
//!
//! ```rust
//! use place_heatmap::{LatLng, geo_utils};
//!
//! let lahore = LatLng::new(31.5204, 74.3587);
//! let nearby = LatLng::new(31.5300, 74.3500);
//!
//! let dist = geo_utils::haversine_distance(&lahore, &nearby);
//! assert!(dist > 1_000.0 && dist < 2_000.0);
//!
//! let area = geo_utils::bounds_around(&lahore, 5_000.0);
//! assert!(area.contains(&nearby));
//! ```
//!
//! All functions expect WGS84 coordinates in degrees, which is what every
//! mainstream places provider returns.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, LatLng};

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates in meters.
///
/// Uses the haversine formula on a spherical Earth (radius 6,371 km), accurate
/// to within 0.3% at city scale.
///
/// ```rust
/// use place_heatmap::{LatLng, geo_utils};
///
/// let london = LatLng::new(51.5074, -0.1278);
/// let paris = LatLng::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &LatLng, p2: &LatLng) -> f64 {
    let point1 = Point::new(p1.lng, p1.lat);
    let point2 = Point::new(p2.lng, p2.lat);
    Haversine::distance(point1, point2)
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Returns the longitude span, which is the larger of the two spans away from
/// the equator, so a box built from it always encloses the circle. The cosine
/// is floored at 0.1 to stay finite near the poles.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = METERS_PER_DEGREE * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Square bounding box enclosing a circle of `radius_meters` around `center`.
///
/// Used as the coarse envelope for R-tree lookups before the exact haversine
/// check, and for the viewport of a device-location place.
pub fn bounds_around(center: &LatLng, radius_meters: f64) -> Bounds {
    let lat_span = radius_meters / METERS_PER_DEGREE;
    let lng_span = meters_to_degrees(radius_meters, center.lat);

    Bounds {
        min_lat: center.lat - lat_span,
        max_lat: center.lat + lat_span,
        min_lng: center.lng - lng_span,
        max_lng: center.lng + lng_span,
    }
}

/// Bounding box of a set of coordinates, or `None` for an empty set.
pub fn compute_bounds<'a, I>(points: I) -> Option<Bounds>
where
    I: IntoIterator<Item = &'a LatLng>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;

    let mut bounds = Bounds {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lng: first.lng,
        max_lng: first.lng,
    };

    for p in iter {
        bounds.min_lat = bounds.min_lat.min(p.lat);
        bounds.max_lat = bounds.max_lat.max(p.lat);
        bounds.min_lng = bounds.min_lng.min(p.lng);
        bounds.max_lng = bounds.max_lng.max(p.lng);
    }

    Some(bounds)
}
