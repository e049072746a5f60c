//! Geospatial distance math for location-based filtering.
//!
//! Distance filtering runs in two phases: a cheap bounding-box predicate
//! on the indexed GPS columns narrows candidates inside SQL, then the
//! exact haversine distance is computed here per row.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude, and of longitude at the equator.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// A latitude/longitude rectangle guaranteed to contain every point
/// within `radius_m` of the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Compute the bounding box used as the SQL pre-filter.
///
/// Longitude degrees shrink with latitude; near the poles the box widens
/// to the full longitude range rather than divide by a vanishing cosine.
pub fn bounding_box(lat: f64, lon: f64, radius_m: f64) -> GeoBounds {
    let dlat = radius_m / METERS_PER_DEGREE;
    let min_lat = (lat - dlat).max(-90.0);
    let max_lat = (lat + dlat).min(90.0);

    let cos_lat = lat.to_radians().cos();
    let (min_lon, max_lon) = if cos_lat < 1e-6 {
        (-180.0, 180.0)
    } else {
        let dlon = radius_m / (METERS_PER_DEGREE * cos_lat);
        if dlon >= 180.0 {
            (-180.0, 180.0)
        } else {
            ((lon - dlon).max(-180.0), (lon + dlon).min(180.0))
        }
    };

    GeoBounds {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Eiffel Tower and Arc de Triomphe, roughly 2.2km apart.
    const EIFFEL: (f64, f64) = (48.8584, 2.2945);
    const ARC: (f64, f64) = (48.8738, 2.2950);

    #[test]
    fn haversine_known_distance() {
        let d = haversine_m(EIFFEL.0, EIFFEL.1, ARC.0, ARC.1);
        assert!((d - 1712.0).abs() < 50.0, "unexpected distance: {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(EIFFEL.0, EIFFEL.1, EIFFEL.0, EIFFEL.1), 0.0);
    }

    #[test]
    fn bounding_box_contains_points_within_radius() {
        let bounds = bounding_box(EIFFEL.0, EIFFEL.1, 3000.0);
        assert!(ARC.0 > bounds.min_lat && ARC.0 < bounds.max_lat);
        assert!(ARC.1 > bounds.min_lon && ARC.1 < bounds.max_lon);
    }

    #[test]
    fn bounding_box_excludes_far_points() {
        let bounds = bounding_box(EIFFEL.0, EIFFEL.1, 1000.0);
        // London is far outside a 1km box around Paris.
        assert!(51.5 > bounds.max_lat);
    }

    #[test]
    fn bounding_box_widens_at_the_pole() {
        let bounds = bounding_box(89.9999, 0.0, 10_000.0);
        assert_eq!(bounds.min_lon, -180.0);
        assert_eq!(bounds.max_lon, 180.0);
        assert_eq!(bounds.max_lat, 90.0);
    }
}
