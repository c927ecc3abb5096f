//! Great-circle distances and the lon/lat envelopes that bound them.

use geo::{Coord, Distance, Haversine, Point};
use rstar::AABB;

/// Mean Earth radius in kilometres (GRS80 R1, as used by [`Haversine`]).
pub const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Haversine distance in kilometres between two WGS84 coordinates
/// (`x = longitude`, `y = latitude`).
#[must_use]
#[expect(clippy::float_arithmetic, reason = "metres to kilometres")]
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b)) / 1_000.0
}

/// Axis-aligned lon/lat boxes that together contain every point within
/// `radius_km` of `centre`.
///
/// The boxes are conservative; callers refine candidates with
/// [`haversine_km`]. A box crossing the antimeridian is split in two, and a
/// box reaching a pole spans every longitude.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "envelope bounds are derived from angular distance"
)]
pub fn search_envelopes(centre: Coord<f64>, radius_km: f64) -> Vec<AABB<[f64; 2]>> {
    let radius = radius_km.max(0.0);
    let dlat = (radius / EARTH_RADIUS_KM).to_degrees();
    let min_lat = (centre.y - dlat).max(-90.0);
    let max_lat = (centre.y + dlat).min(90.0);

    let widest_lat = min_lat.abs().max(max_lat.abs());
    let reaches_pole = widest_lat >= 90.0;
    let cos_lat = widest_lat.to_radians().cos();
    let dlon = if reaches_pole || cos_lat <= f64::EPSILON {
        180.0
    } else {
        dlat / cos_lat
    };

    if dlon >= 180.0 {
        return vec![AABB::from_corners([-180.0, min_lat], [180.0, max_lat])];
    }

    let west = centre.x - dlon;
    let east = centre.x + dlon;
    if west < -180.0 {
        vec![
            AABB::from_corners([west + 360.0, min_lat], [180.0, max_lat]),
            AABB::from_corners([-180.0, min_lat], [east, max_lat]),
        ]
    } else if east > 180.0 {
        vec![
            AABB::from_corners([west, min_lat], [180.0, max_lat]),
            AABB::from_corners([-180.0, min_lat], [east - 360.0, max_lat]),
        ]
    } else {
        vec![AABB::from_corners([west, min_lat], [east, max_lat])]
    }
}
