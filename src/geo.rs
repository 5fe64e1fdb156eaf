//! Great-circle distance helpers.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two WGS84 coordinates.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance() {
        assert_eq!(haversine_m(12.9, 77.6, 12.9, 77.6), 0.0);
    }

    #[test]
    fn small_offset_is_a_few_meters() {
        // 0.00005 deg of longitude at the equator is ~5.6 m
        let d = haversine_m(0.0, 0.0, 0.0, 0.00005);
        assert!(d > 5.0 && d < 6.0, "got {d}");
    }

    #[test]
    fn fifty_meter_offset() {
        // 0.00045 deg of latitude is ~50 m
        let d = haversine_m(0.0, 0.0, 0.00045, 0.0);
        assert!(d > 49.0 && d < 51.0, "got {d}");
    }

    #[test]
    fn known_city_pair() {
        // Bangalore city center to Whitefield, roughly 15.5 km
        let d = haversine_m(12.9716, 77.5946, 12.9698, 77.7500);
        assert!(d > 15_000.0 && d < 18_000.0, "got {d}");
    }
}
