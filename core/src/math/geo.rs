use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geographic position; altitude in metres above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Great-circle (haversine) distance in metres, ignoring altitude.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// East/north/up offset in metres from `origin` (equirectangular, fine for tens of km).
    pub fn to_local(&self, origin: &GeoPoint) -> Vector3<f64> {
        let north = (self.latitude - origin.latitude).to_radians() * EARTH_RADIUS_M;
        let east = (self.longitude - origin.longitude).to_radians()
            * EARTH_RADIUS_M
            * origin.latitude.to_radians().cos();
        Vector3::new(east, north, self.altitude - origin.altitude)
    }

    /// Inverse of [`GeoPoint::to_local`].
    pub fn from_local(origin: &GeoPoint, offset: &Vector3<f64>) -> GeoPoint {
        let latitude = origin.latitude + (offset.y / EARTH_RADIUS_M).to_degrees();
        let longitude = origin.longitude
            + (offset.x / (EARTH_RADIUS_M * origin.latitude.to_radians().cos())).to_degrees();
        GeoPoint::new(latitude, longitude, origin.altitude + offset.z)
    }
}

/// Maps any angle in degrees into [0, 360).
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed smallest difference `a - b` in degrees, in (-180, 180].
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = wrap_degrees(a - b);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Compass bearing (degrees from north) of a horizontal east/north vector.
pub fn bearing_of(east: f64, north: f64) -> f64 {
    wrap_degrees(east.atan2(north).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = GeoPoint::new(0.0, 0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0, 0.0);
        assert_relative_eq!(a.distance_to(&b), 111_194.9, max_relative = 1e-4);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(-1.47, -78.44, 2500.0);
        let b = GeoPoint::new(-1.50, -78.40, 3100.0);
        assert_relative_eq!(a.distance_to(&b), b.distance_to(&a), epsilon = 1e-6);
    }

    #[test]
    fn local_round_trip_preserves_position() {
        let origin = GeoPoint::new(37.75, 15.0, 3300.0);
        let offset = Vector3::new(4000.0, -2500.0, -1800.0);
        let point = GeoPoint::from_local(&origin, &offset);
        let back = point.to_local(&origin);
        assert_relative_eq!(back, offset, epsilon = 1e-6);
    }

    #[test]
    fn bearing_of_local_offsets() {
        assert_relative_eq!(bearing_of(0.0, 1.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(bearing_of(1.0, 0.0), 90.0, epsilon = 1e-9);
        assert_relative_eq!(bearing_of(-1.0, 0.0), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn angle_difference_wraps_across_north() {
        assert_relative_eq!(angle_difference(10.0, 350.0), 20.0);
        assert_relative_eq!(angle_difference(350.0, 10.0), -20.0);
        assert_relative_eq!(angle_difference(180.0, 0.0), 180.0);
    }
}
