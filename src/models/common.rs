use serde::Serialize;

use crate::models::error::TrajectoryError;

/// 地球の平均半径（km）
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;
/// 標準重力加速度の大きさ（km/s²）
pub const STANDARD_GRAVITY_KM_S2: f64 = 0.0098;
/// 地球の標準重力定数 μ（km³/s²）
pub const EARTH_STD_GRAV_PARAM_KM3_S2: f64 = 398_600.4418;
/// 2点を同一とみなす中心角の閾値（rad）
pub const COINCIDENT_TOLERANCE_RAD: f64 = 1e-12;

/// 緯度経度で表す地表上の点（度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    lat_deg: f64,
    lon_deg: f64,
}

impl GeoPoint {
    /// 範囲検証付きで地点を作成
    ///
    /// 緯度は[-90, 90]、経度は[-180, 180]の範囲でなければなりません。
    pub fn new(lat_deg: f64, lon_deg: f64) -> Result<Self, TrajectoryError> {
        let valid = lat_deg.is_finite()
            && lon_deg.is_finite()
            && (-90.0..=90.0).contains(&lat_deg)
            && (-180.0..=180.0).contains(&lon_deg);
        if !valid {
            return Err(TrajectoryError::InvalidCoordinate { lat_deg, lon_deg });
        }
        Ok(Self { lat_deg, lon_deg })
    }

    /// 正規化済みの値から作成（測地計算の出力用）
    pub(crate) fn normalized(lat_deg: f64, lon_deg: f64) -> Self {
        Self {
            lat_deg: lat_deg.clamp(-90.0, 90.0),
            lon_deg: math_utils::normalize_longitude(lon_deg),
        }
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat_deg
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon_deg
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat_deg, self.lon_deg)
    }
}

/// 軌道上の1サンプル
///
/// 時刻昇順・固定刻みで並んだ列として1発分の経路を表します。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySample {
    /// シミュレーション基準時刻からの時刻（秒）
    pub time_abs: f64,
    /// 当該飛翔体の発射からの経過時間（秒）
    pub elapsed_s: f64,
    pub position: GeoPoint,
    pub altitude_km: f64,
    /// 進行方位（度、北から時計回り）
    pub bearing_deg: f64,
    /// 3Dモデル表示用のチルト角（度）
    pub tilt_deg: f64,
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 方位角を0度〜360度未満の範囲に正規化
    pub fn normalize_bearing(angle_deg: f64) -> f64 {
        let normalized = angle_deg.rem_euclid(360.0);
        // rem_euclidは丸めで360.0を返すことがある
        if normalized >= 360.0 { 0.0 } else { normalized }
    }

    /// 経度を-180度〜180度未満の範囲に正規化
    pub fn normalize_longitude(lon_deg: f64) -> f64 {
        let normalized = (lon_deg + 540.0).rem_euclid(360.0) - 180.0;
        if normalized >= 180.0 { -180.0 } else { normalized }
    }

    /// 経路角（度）をモデル表示用チルト角に変換
    ///
    /// 反時計回り・東基準の角度を時計回り・北基準に変換したものと同じです。
    pub fn flight_path_to_tilt(flight_path_deg: f64) -> f64 {
        normalize_bearing(90.0 - flight_path_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_range_validation() {
        assert!(GeoPoint::new(0.0, 0.0).is_ok());
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
        assert!(GeoPoint::new(90.5, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.1).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_normalize_longitude() {
        assert!((math_utils::normalize_longitude(190.0) - (-170.0)).abs() < 1e-9);
        assert!((math_utils::normalize_longitude(-190.0) - 170.0).abs() < 1e-9);
        assert_eq!(math_utils::normalize_longitude(180.0), -180.0);
        assert!((math_utils::normalize_longitude(45.0) - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_bearing() {
        assert!((math_utils::normalize_bearing(-90.0) - 270.0).abs() < 1e-12);
        assert!((math_utils::normalize_bearing(720.0)).abs() < 1e-12);
        assert!(math_utils::normalize_bearing(-1e-18) < 360.0);
    }

    #[test]
    fn test_flight_path_to_tilt() {
        assert!((math_utils::flight_path_to_tilt(0.0) - 90.0).abs() < 1e-12);
        assert!((math_utils::flight_path_to_tilt(90.0)).abs() < 1e-12);
        assert!((math_utils::flight_path_to_tilt(-45.0) - 135.0).abs() < 1e-12);
    }
}
