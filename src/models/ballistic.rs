use crate::models::{
    common::{GeoPoint, EARTH_STD_GRAV_PARAM_KM3_S2},
    error::TrajectoryError,
    geodesy::SphericalEarth,
    sampling::SampleIter,
    traits::ITrajectory,
};
use tracing::{debug, warn};

/// 弾道ミサイルの入力パラメータ
#[derive(Debug, Clone, Copy)]
pub struct BallisticParams {
    /// 発射地点
    pub launch_point: GeoPoint,
    /// 照準点（弾着点）
    pub aim_point: GeoPoint,
    /// 一定の水平速度（km/s）
    pub horizontal_speed_km_s: f64,
    /// 重力加速度の大きさ（km/s²）
    pub gravity_km_s2: f64,
    /// 発射時刻（シミュレーション基準時刻からの秒）
    pub launch_time_abs: f64,
}

/// 弾道ミサイル
///
/// 発射地点・照準点・一定水平速度だけから閉形式の放物線軌道を構成します。
/// 水平方向は大圏経路上の等速運動、鉛直方向は飛翔時間の中点で頂点に達する放物線です。
/// 生成後に変更されることはありません。
#[derive(Debug, Clone)]
pub struct BallisticMissile {
    id: String,
    params: BallisticParams,
    earth: SphericalEarth,

    great_circle_distance_km: f64,
    launch_bearing_deg: f64,
    total_flight_time_s: f64,
    apogee_time_s: f64,
    initial_vertical_velocity_km_s: f64,
}

impl BallisticMissile {
    /// 弾道ミサイルを作成し、派生値を計算します
    ///
    /// # 引数
    ///
    /// * `id` - ミサイルの一意識別子
    /// * `params` - 発射地点・照準点・速度などの入力
    /// * `earth` - 計算に使う球面地球モデル
    ///
    /// # 戻り値
    ///
    /// 水平速度が正でない場合や発射地点と照準点が一致する場合は `InvalidMissileConfig`
    pub fn new(id: String, params: BallisticParams, earth: SphericalEarth) -> Result<Self, TrajectoryError> {
        let invalid = |reason: &str| TrajectoryError::InvalidMissileConfig {
            id: id.clone(),
            reason: reason.to_string(),
        };

        if !params.horizontal_speed_km_s.is_finite() || params.horizontal_speed_km_s <= 0.0 {
            return Err(invalid("horizontal_speed_km_s must be positive"));
        }
        if !params.gravity_km_s2.is_finite() || params.gravity_km_s2 <= 0.0 {
            return Err(invalid("gravity_km_s2 must be positive"));
        }
        if !params.launch_time_abs.is_finite() {
            return Err(invalid("launch_time_abs must be finite"));
        }
        if !earth.radius_km.is_finite() || earth.radius_km <= 0.0 {
            return Err(invalid("earth radius must be positive"));
        }
        if earth.coincident(&params.launch_point, &params.aim_point) {
            return Err(invalid("launch_point and aim_point coincide"));
        }

        let great_circle_distance_km = earth.distance(&params.launch_point, &params.aim_point);
        let launch_bearing_deg = earth
            .initial_bearing(&params.launch_point, &params.aim_point)
            .map_err(|_| invalid("launch_point and aim_point coincide"))?;
        let total_flight_time_s = great_circle_distance_km / params.horizontal_speed_km_s;
        let apogee_time_s = 0.5 * total_flight_time_s;
        let initial_vertical_velocity_km_s = params.gravity_km_s2 * apogee_time_s;

        let missile = Self {
            id,
            params,
            earth,
            great_circle_distance_km,
            launch_bearing_deg,
            total_flight_time_s,
            apogee_time_s,
            initial_vertical_velocity_km_s,
        };

        let escape_velocity = (2.0 * EARTH_STD_GRAV_PARAM_KM3_S2 / earth.radius_km).sqrt();
        if missile.initial_launch_velocity_km_s() > escape_velocity {
            warn!(
                "{}: 初速 {:.3} km/s が脱出速度 {:.3} km/s を超えています",
                missile.id,
                missile.initial_launch_velocity_km_s(),
                escape_velocity
            );
        }

        debug!(
            "弾道ミサイル作成: {} 距離 {:.2} km, 飛翔時間 {:.2} 秒, 頂点高度 {:.2} km",
            missile.id,
            missile.great_circle_distance_km,
            missile.total_flight_time_s,
            missile.apogee_altitude_km()
        );

        Ok(missile)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn launch_point(&self) -> GeoPoint {
        self.params.launch_point
    }

    pub fn aim_point(&self) -> GeoPoint {
        self.params.aim_point
    }

    pub fn gravity_km_s2(&self) -> f64 {
        self.params.gravity_km_s2
    }

    pub fn great_circle_distance_km(&self) -> f64 {
        self.great_circle_distance_km
    }

    /// 発射地点から照準点への初期方位角（度）
    pub fn launch_bearing_deg(&self) -> f64 {
        self.launch_bearing_deg
    }

    pub fn total_flight_time_s(&self) -> f64 {
        self.total_flight_time_s
    }

    pub fn apogee_time_s(&self) -> f64 {
        self.apogee_time_s
    }

    pub fn initial_vertical_velocity_km_s(&self) -> f64 {
        self.initial_vertical_velocity_km_s
    }

    /// 発射方向の初速（km/s）
    pub fn initial_launch_velocity_km_s(&self) -> f64 {
        self.params.horizontal_speed_km_s.hypot(self.initial_vertical_velocity_km_s)
    }

    /// 発射仰角（度）
    pub fn launch_elevation_deg(&self) -> f64 {
        self.initial_vertical_velocity_km_s
            .atan2(self.params.horizontal_speed_km_s)
            .to_degrees()
    }

    pub fn apogee_altitude_km(&self) -> f64 {
        self.altitude_at(self.apogee_time_s)
    }

    /// 大圏経路上の進行率（0〜1）
    pub fn along_track_fraction(&self, elapsed_s: f64) -> f64 {
        (elapsed_s / self.total_flight_time_s).clamp(0.0, 1.0)
    }

    /// 発射から終端までの遅延サンプル列を生成
    pub fn generate(&self, time_step_s: f64) -> Result<SampleIter<'_, Self>, TrajectoryError> {
        SampleIter::new(self, time_step_s)
    }
}

impl ITrajectory for BallisticMissile {
    fn get_id(&self) -> &str {
        &self.id
    }

    fn launch_time_abs(&self) -> f64 {
        self.params.launch_time_abs
    }

    fn flight_duration_s(&self) -> f64 {
        self.total_flight_time_s
    }

    fn horizontal_speed_km_s(&self) -> f64 {
        self.params.horizontal_speed_km_s
    }

    fn terminal_point(&self) -> GeoPoint {
        self.params.aim_point
    }

    fn position_at(&self, elapsed_s: f64) -> GeoPoint {
        let along_track_km = self.along_track_fraction(elapsed_s) * self.great_circle_distance_km;
        self.earth
            .destination_point(&self.params.launch_point, self.launch_bearing_deg, along_track_km)
    }

    fn altitude_at(&self, elapsed_s: f64) -> f64 {
        let t = elapsed_s.clamp(0.0, self.total_flight_time_s);
        let altitude = self.initial_vertical_velocity_km_s * t - 0.5 * self.params.gravity_km_s2 * t * t;
        altitude.max(0.0)
    }

    fn vertical_velocity_at(&self, elapsed_s: f64) -> f64 {
        self.initial_vertical_velocity_km_s - self.params.gravity_km_s2 * elapsed_s
    }

    fn earth(&self) -> &SphericalEarth {
        &self.earth
    }
}
