//! 球面地球モデル上の測地計算
//!
//! 大圏距離（haversine）、初期方位角、距離と方位からの到達点を提供します。
//! 地球は一定半径の完全な球として扱います（楕円体ではありません）。
//! インターフェースの角度は度、内部計算はラジアンです。

use crate::models::common::{GeoPoint, COINCIDENT_TOLERANCE_RAD, EARTH_MEAN_RADIUS_KM};
use crate::models::common::math_utils;
use crate::models::error::TrajectoryError;

/// 一定半径の球面地球
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalEarth {
    pub radius_km: f64,
}

impl Default for SphericalEarth {
    fn default() -> Self {
        Self { radius_km: EARTH_MEAN_RADIUS_KM }
    }
}

impl SphericalEarth {
    pub fn new(radius_km: f64) -> Self {
        Self { radius_km }
    }

    /// 2点間の中心角（rad）
    pub fn central_angle(&self, p1: &GeoPoint, p2: &GeoPoint) -> f64 {
        let lat1 = p1.lat_deg().to_radians();
        let lat2 = p2.lat_deg().to_radians();
        let dlat = lat2 - lat1;
        let dlon = (p2.lon_deg() - p1.lon_deg()).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let a = a.clamp(0.0, 1.0);
        2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// 大圏距離（km）
    pub fn distance(&self, p1: &GeoPoint, p2: &GeoPoint) -> f64 {
        self.radius_km * self.central_angle(p1, p2)
    }

    /// 許容誤差内で同一地点かどうか（極・日付変更線の表記揺れを含む）
    pub fn coincident(&self, p1: &GeoPoint, p2: &GeoPoint) -> bool {
        self.central_angle(p1, p2) < COINCIDENT_TOLERANCE_RAD
    }

    /// p1からp2への初期方位角（度、[0, 360)）
    ///
    /// 2点が一致する場合は方位が定義できないため `DegenerateGeometry` を返します。
    pub fn initial_bearing(&self, p1: &GeoPoint, p2: &GeoPoint) -> Result<f64, TrajectoryError> {
        if self.coincident(p1, p2) {
            return Err(TrajectoryError::DegenerateGeometry);
        }

        let lat1 = p1.lat_deg().to_radians();
        let lat2 = p2.lat_deg().to_radians();
        let dlon = (p2.lon_deg() - p1.lon_deg()).to_radians();

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        Ok(math_utils::normalize_bearing(y.atan2(x).to_degrees()))
    }

    /// 起点から方位・距離だけ進んだ到達点（測地第一問題）
    ///
    /// 極越えと日付変更線をまたぐ場合も経度は[-180, 180)に正規化されます。
    pub fn destination_point(&self, origin: &GeoPoint, bearing_deg: f64, distance_km: f64) -> GeoPoint {
        let lat1 = origin.lat_deg().to_radians();
        let lon1 = origin.lon_deg().to_radians();
        let theta = bearing_deg.to_radians();
        let delta = distance_km / self.radius_km;

        let sin_lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).clamp(-1.0, 1.0);
        let lat2 = sin_lat2.asin();
        let lon2 = lon1
            + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * sin_lat2);

        GeoPoint::normalized(lat2.to_degrees(), lon2.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_distance_zero_and_symmetric() {
        let earth = SphericalEarth::default();
        let points = [pt(0.0, 0.0), pt(35.68, 139.77), pt(-33.87, 151.21), pt(89.9, -179.0), pt(-90.0, 0.0)];
        for p in &points {
            assert_eq!(earth.distance(p, p), 0.0);
            for q in &points {
                assert!((earth.distance(p, q) - earth.distance(q, p)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_distance_equator_ten_degrees() {
        let earth = SphericalEarth::default();
        let d = earth.distance(&pt(0.0, 0.0), &pt(0.0, 10.0));
        assert!((d - 1111.95).abs() < 0.01, "distance = {}", d);
    }

    #[test]
    fn test_wraparound_points_coincide() {
        let earth = SphericalEarth::default();
        assert!(earth.coincident(&pt(10.0, 180.0), &pt(10.0, -180.0)));
        assert!(earth.coincident(&pt(90.0, 0.0), &pt(90.0, 123.0)));
        assert!(earth.distance(&pt(0.0, 179.5), &pt(0.0, -179.5)) < 112.0);
    }

    #[test]
    fn test_initial_bearing_cardinal() {
        let earth = SphericalEarth::default();
        let origin = pt(0.0, 0.0);
        assert!((earth.initial_bearing(&origin, &pt(10.0, 0.0)).unwrap()).abs() < 1e-9);
        assert!((earth.initial_bearing(&origin, &pt(0.0, 10.0)).unwrap() - 90.0).abs() < 1e-9);
        assert!((earth.initial_bearing(&origin, &pt(-10.0, 0.0)).unwrap() - 180.0).abs() < 1e-9);
        assert!((earth.initial_bearing(&origin, &pt(0.0, -10.0)).unwrap() - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_initial_bearing_degenerate() {
        let earth = SphericalEarth::default();
        let p = pt(12.0, 34.0);
        assert_eq!(earth.initial_bearing(&p, &p), Err(TrajectoryError::DegenerateGeometry));
    }

    #[test]
    fn test_destination_point_round_trip() {
        let earth = SphericalEarth::default();
        let origins = [pt(0.0, 0.0), pt(45.0, -120.0), pt(-60.0, 170.0)];
        for origin in &origins {
            for bearing in [0.0, 45.0, 135.0, 200.0, 359.0] {
                for d in [0.0, 10.0, 1500.0, 9000.0] {
                    let dest = earth.destination_point(origin, bearing, d);
                    let back = earth.destination_point(origin, bearing, earth.distance(origin, &dest));
                    assert!(earth.distance(&dest, &back) < 1e-6, "origin={} bearing={} d={}", origin, bearing, d);
                }
            }
        }
    }

    #[test]
    fn test_destination_point_crosses_antimeridian() {
        let earth = SphericalEarth::default();
        let dest = earth.destination_point(&pt(0.0, 179.0), 90.0, earth.radius_km * 2f64.to_radians());
        assert!((dest.lon_deg() - (-179.0)).abs() < 1e-9);
        assert!(dest.lat_deg().abs() < 1e-9);
    }

    #[test]
    fn test_destination_point_crosses_pole() {
        let earth = SphericalEarth::default();
        let dest = earth.destination_point(&pt(80.0, 0.0), 0.0, earth.radius_km * 20f64.to_radians());
        assert!((dest.lat_deg() - 80.0).abs() < 1e-6);
        assert!((dest.lon_deg().abs() - 180.0).abs() < 1e-6);
    }
}
