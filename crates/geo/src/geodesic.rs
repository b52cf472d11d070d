//! Geodesic primitives on a spherical Earth.
//!
//! The Haversine formula calculates the great-circle distance between two points
//! on a sphere given their longitudes and latitudes. Bearings follow the compass
//! convention: 0° is north, angles grow clockwise.
//!
//! These functions propagate NaN rather than masking it; the higher-level
//! engine operations filter invalid points before calling in here.

use crate::GeoPoint;

/// Earth's mean radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculates the great-circle distance between two points in kilometers.
///
/// Symmetric in its arguments and zero only when both points coincide.
///
/// # Example
/// ```
/// use uavo_geo::{haversine_km, GeoPoint};
///
/// let a = GeoPoint::new(52.0, 23.0);
/// let b = GeoPoint::new(52.1, 23.0);
///
/// let distance = haversine_km(&a, &b);
/// assert!((distance - 11.12).abs() < 0.01);
/// ```
#[inline]
pub fn haversine_km(from: &GeoPoint, to: &GeoPoint) -> f64 {
    haversine_with_radius(from, to, EARTH_RADIUS_KM)
}

/// Calculates the great-circle distance between two points in meters.
#[inline]
pub fn haversine_m(from: &GeoPoint, to: &GeoPoint) -> f64 {
    haversine_with_radius(from, to, EARTH_RADIUS_M)
}

#[inline]
fn haversine_with_radius(from: &GeoPoint, to: &GeoPoint, radius: f64) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` a hair above 1 for antipodal points.
    let a = a.min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius * c
}

/// Forward azimuth from `from` to `to`, in degrees within `[0, 360)`.
///
/// Returns 0 when the two points coincide.
pub fn initial_bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f64 {
    if from == to {
        return 0.0;
    }

    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();
    let d_lon = lon2 - lon1;

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Point reached by travelling `distance_km` from `origin` along the great
/// circle that starts at `bearing_deg`.
///
/// The resulting longitude is normalised to `(-180, 180]`.
///
/// # Example
/// ```
/// use uavo_geo::{destination_point, GeoPoint};
///
/// let start = GeoPoint::new(52.0, 23.0);
/// let north = destination_point(&start, 0.0, 11.12);
/// assert!((north.lat - 52.1).abs() < 0.001);
/// assert!((north.lng - 23.0).abs() < 1e-9);
/// ```
pub fn destination_point(origin: &GeoPoint, bearing_deg: f64, distance_km: f64) -> GeoPoint {
    let (lat1, lon1) = origin.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_km / EARTH_RADIUS_KM;

    let sin_lat2 = lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = theta.sin() * delta.sin() * lat1.cos();
    let x = delta.cos() - lat1.sin() * lat2.sin();
    let lon2 = lon1 + y.atan2(x);

    GeoPoint::new(lat2.to_degrees(), normalize_longitude(lon2.to_degrees()))
}

/// Normalises any angle in degrees into `[0, 360)`.
///
/// Non-finite input maps to 0.
#[inline]
pub fn normalize_bearing(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let normalized = deg.rem_euclid(360.0);
    // rem_euclid can round tiny negatives up to exactly 360.0
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Signed shortest turn from bearing `from` to bearing `to`, in `(-180, 180]`.
///
/// Positive values turn clockwise (right), negative values counter-clockwise.
#[inline]
pub fn bearing_delta(from: f64, to: f64) -> f64 {
    let delta = normalize_bearing(to - from);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Squared distance in raw degree space.
///
/// Intentionally ignores the curvature of the Earth; only suitable for
/// cheap nearest-neighbour previews over small areas.
#[inline]
pub fn planar_distance_sq(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let d_lat = to.lat - from.lat;
    let d_lng = to.lng - from.lng;
    d_lat * d_lat + d_lng * d_lng
}

fn normalize_longitude(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { wrapped + 360.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BIALYSTOK: GeoPoint = GeoPoint { lat: 53.1325, lng: 23.1688 };
    const WARSAW: GeoPoint = GeoPoint { lat: 52.2297, lng: 21.0122 };
    const BERLIN: GeoPoint = GeoPoint { lat: 52.5200, lng: 13.4050 };
    const PARIS: GeoPoint = GeoPoint { lat: 48.8566, lng: 2.3522 };

    #[test]
    fn test_berlin_to_paris() {
        let distance = haversine_km(&BERLIN, &PARIS);
        // Expected: ~878 km
        assert!((distance - 878.0).abs() < 5.0, "Berlin-Paris: {}", distance);
    }

    #[test]
    fn test_bialystok_to_warsaw() {
        let distance = haversine_km(&BIALYSTOK, &WARSAW);
        assert!((distance - 176.0).abs() < 5.0, "Bialystok-Warsaw: {}", distance);
    }

    #[test]
    fn test_same_point_zero_distance() {
        assert_eq!(haversine_km(&BERLIN, &BERLIN), 0.0);
    }

    #[test]
    fn test_meters_conversion() {
        let km = haversine_km(&BERLIN, &PARIS);
        let meters = haversine_m(&BERLIN, &PARIS);
        assert!((meters - km * 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_cardinal_bearings() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert!((initial_bearing_deg(&origin, &GeoPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((initial_bearing_deg(&origin, &GeoPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((initial_bearing_deg(&origin, &GeoPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((initial_bearing_deg(&origin, &GeoPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_of_coincident_points_is_zero() {
        assert_eq!(initial_bearing_deg(&WARSAW, &WARSAW), 0.0);
    }

    #[test]
    fn test_destination_wraps_antimeridian() {
        let start = GeoPoint::new(0.0, 179.9);
        let east = destination_point(&start, 90.0, 50.0);
        assert!(east.lng < -179.0 && east.lng > -180.0, "lng: {}", east.lng);
    }

    #[test]
    fn test_normalize_bearing() {
        assert_eq!(normalize_bearing(0.0), 0.0);
        assert_eq!(normalize_bearing(360.0), 0.0);
        assert_eq!(normalize_bearing(-90.0), 270.0);
        assert_eq!(normalize_bearing(725.0), 5.0);
        assert_eq!(normalize_bearing(f64::NAN), 0.0);
    }

    #[test]
    fn test_bearing_delta_wraparound() {
        assert_eq!(bearing_delta(350.0, 10.0), 20.0);
        assert_eq!(bearing_delta(10.0, 350.0), -20.0);
        assert_eq!(bearing_delta(0.0, 180.0), 180.0);
        assert_eq!(bearing_delta(180.0, 0.0), 180.0);
        assert_eq!(bearing_delta(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_normalize_longitude_range() {
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert!((normalize_longitude(190.0) - (-170.0)).abs() < 1e-9);
    }

    fn point() -> impl Strategy<Value = GeoPoint> {
        (-80.0f64..80.0, -179.0f64..179.0).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
    }

    proptest! {
        #[test]
        fn prop_distance_symmetric_non_negative(a in point(), b in point()) {
            let ab = haversine_km(&a, &b);
            let ba = haversine_km(&b, &a);
            prop_assert!(ab >= 0.0);
            prop_assert!((ab - ba).abs() < 1e-9);
        }

        #[test]
        fn prop_destination_round_trip(
            origin in point(),
            bearing in 0.0f64..360.0,
            distance in 0.5f64..500.0,
        ) {
            let dest = destination_point(&origin, bearing, distance);
            let measured = haversine_km(&origin, &dest);
            prop_assert!((measured - distance).abs() < 1e-6 * distance.max(1.0));

            let back = initial_bearing_deg(&origin, &dest);
            prop_assert!(bearing_delta(bearing, back).abs() < 1e-6);
        }

        #[test]
        fn prop_bearing_delta_range(from in -720.0f64..720.0, to in -720.0f64..720.0) {
            let delta = bearing_delta(from, to);
            prop_assert!(delta > -180.0 && delta <= 180.0);
        }
    }
}
