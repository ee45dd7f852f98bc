//! Great-circle distance on the WGS84 sphere.

use crate::db_types::Coordinate;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometers.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_distance() {
        let p = Coordinate::new(52.52, 13.405);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn berlin_to_potsdam() {
        // Alexanderplatz to Potsdam Hbf is roughly 27 km as the crow flies.
        let alexanderplatz = Coordinate::new(52.5219, 13.4132);
        let potsdam = Coordinate::new(52.3906, 13.0645);
        let d = haversine_km(alexanderplatz, potsdam);
        assert!((d - 27.5).abs() < 1.5, "got {d} km");
    }

    #[test]
    fn symmetric() {
        let a = Coordinate::new(48.1374, 11.5755);
        let b = Coordinate::new(50.1109, 8.6821);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }
}
