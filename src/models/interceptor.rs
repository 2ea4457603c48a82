use serde::Serialize;
use tracing::{debug, info};

use crate::models::{
    ballistic::BallisticMissile,
    common::GeoPoint,
    error::{InfeasibleReason, TrajectoryError},
    geodesy::SphericalEarth,
    sampling::SampleIter,
    traits::ITrajectory,
};

/// 迎撃ミサイル（解算前）
///
/// 発射地点・水平速度・目標ID・照準点手前の離隔距離だけを持ちます。
/// 迎撃点や発射時刻などの派生値は `solve` が成功して初めて `SolvedInterceptor` として得られます。
#[derive(Debug, Clone)]
pub struct Interceptor {
    pub id: String,
    pub launch_point: GeoPoint,
    pub horizontal_speed_km_s: f64,
    pub target_missile_id: String,
    /// 照準点から大圏経路に沿って手前に取る距離（km）
    pub standoff_distance_km: f64,
    /// 最大地上射程（km）、未指定なら無制限
    pub max_ground_range_km: Option<f64>,
}

/// 迎撃解算の制約条件
#[derive(Debug, Clone, Copy)]
pub struct InterceptConstraints {
    /// 許容される最早発射時刻（シミュレーション基準時刻からの秒）
    pub earliest_launch_time_abs: f64,
}

impl Default for InterceptConstraints {
    fn default() -> Self {
        Self { earliest_launch_time_abs: 0.0 }
    }
}

/// 迎撃解算の結果（一度だけ書き込まれる派生値）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterceptSolution {
    pub intercept_point: GeoPoint,
    pub intercept_altitude_km: f64,
    /// 目標ミサイル発射からの迎撃時刻（秒）
    pub target_elapsed_s: f64,
    pub intercept_time_abs: f64,
    pub launch_time_abs: f64,
    /// 迎撃ミサイルの発射から迎撃までの飛翔時間（秒）
    pub flight_time_s: f64,
    pub ground_distance_km: f64,
    pub launch_bearing_deg: f64,
    pub initial_vertical_velocity_km_s: f64,
    /// 発射時の速度の大きさ（km/s）
    pub initial_launch_velocity_km_s: f64,
    pub launch_elevation_deg: f64,
    /// 発射地点から迎撃点までの直線距離（km）
    pub slant_range_km: f64,
}

impl Interceptor {
    pub fn new(
        id: String,
        launch_point: GeoPoint,
        horizontal_speed_km_s: f64,
        target_missile_id: String,
        standoff_distance_km: f64,
    ) -> Result<Self, TrajectoryError> {
        let interceptor = Self {
            id,
            launch_point,
            horizontal_speed_km_s,
            target_missile_id,
            standoff_distance_km,
            max_ground_range_km: None,
        };
        interceptor.validate()?;
        Ok(interceptor)
    }

    /// 最大地上射程を設定
    pub fn with_max_ground_range(mut self, max_ground_range_km: f64) -> Result<Self, TrajectoryError> {
        self.max_ground_range_km = Some(max_ground_range_km);
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), TrajectoryError> {
        let invalid = |reason: &str| TrajectoryError::InvalidInterceptorConfig {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if !self.horizontal_speed_km_s.is_finite() || self.horizontal_speed_km_s <= 0.0 {
            return Err(invalid("horizontal_speed_km_s must be positive"));
        }
        if !self.standoff_distance_km.is_finite() || self.standoff_distance_km < 0.0 {
            return Err(invalid("standoff_distance_km must be non-negative"));
        }
        if let Some(range) = self.max_ground_range_km {
            if !range.is_finite() || range <= 0.0 {
                return Err(invalid("max_ground_range_km must be positive"));
            }
        }
        Ok(())
    }

    /// 目標ミサイルとの会合点を解算
    ///
    /// 1. 照準点から離隔距離だけ手前の経路上の点を迎撃点とし、進行率 f* から迎撃時刻 t* = f*·T を得る
    /// 2. 迎撃点までの地上距離を水平速度で割って飛翔時間を得る
    /// 3. 飛翔時間と迎撃高度から鉛直初速を逆算し、発射仰角を求める
    /// 4. 迎撃時刻から飛翔時間を引いて発射時刻とする
    ///
    /// 水平位置が時間の一次関数なので、位置と時刻の連立は代入で閉形式に解けます。
    pub fn solve(
        &self,
        missile: &BallisticMissile,
        constraints: &InterceptConstraints,
    ) -> Result<SolvedInterceptor, TrajectoryError> {
        if self.target_missile_id != missile.id() {
            return Err(TrajectoryError::infeasible(
                &self.id,
                InfeasibleReason::TargetMismatch,
                format!("targets {}, got {}", self.target_missile_id, missile.id()),
            ));
        }

        let path_km = missile.great_circle_distance_km();
        if self.standoff_distance_km >= path_km {
            return Err(TrajectoryError::UnreachableStandoff {
                interceptor_id: self.id.clone(),
                standoff_km: self.standoff_distance_km,
                path_km,
            });
        }

        // 1. 迎撃点と迎撃時刻
        let fraction = (path_km - self.standoff_distance_km) / path_km;
        let target_elapsed_s = fraction * missile.total_flight_time_s();
        let intercept_point = missile.position_at(target_elapsed_s);
        let intercept_altitude_km = missile.altitude_at(target_elapsed_s);

        // 2. 迎撃ミサイルの飛翔時間
        let earth = *missile.earth();
        if earth.coincident(&self.launch_point, &intercept_point) {
            return Err(TrajectoryError::infeasible(
                &self.id,
                InfeasibleReason::ZeroGroundDistance,
                format!("launch point {} is the intercept point", self.launch_point),
            ));
        }
        let ground_distance_km = earth.distance(&self.launch_point, &intercept_point);
        if let Some(range) = self.max_ground_range_km {
            if ground_distance_km > range {
                return Err(TrajectoryError::infeasible(
                    &self.id,
                    InfeasibleReason::OutOfGroundRange,
                    format!("ground distance {:.3} km > range {:.3} km", ground_distance_km, range),
                ));
            }
        }
        let flight_time_s = ground_distance_km / self.horizontal_speed_km_s;
        if flight_time_s > target_elapsed_s {
            return Err(TrajectoryError::infeasible(
                &self.id,
                InfeasibleReason::LaunchPrecedesThreat,
                format!(
                    "flight time {:.3} s exceeds target time-to-intercept {:.3} s",
                    flight_time_s, target_elapsed_s
                ),
            ));
        }

        // 4. 絶対時刻
        let intercept_time_abs = missile.launch_time_abs() + target_elapsed_s;
        let launch_time_abs = intercept_time_abs - flight_time_s;
        if launch_time_abs < constraints.earliest_launch_time_abs {
            return Err(TrajectoryError::infeasible(
                &self.id,
                InfeasibleReason::BeforeEarliestLaunch,
                format!(
                    "launch time {:.3} s < earliest {:.3} s",
                    launch_time_abs, constraints.earliest_launch_time_abs
                ),
            ));
        }

        // 3. 鉛直方向の逆問題: h = v0·T − ½gT²
        let gravity = missile.gravity_km_s2();
        let initial_vertical_velocity_km_s =
            (intercept_altitude_km + 0.5 * gravity * flight_time_s * flight_time_s) / flight_time_s;
        let launch_elevation_deg = initial_vertical_velocity_km_s
            .atan2(self.horizontal_speed_km_s)
            .to_degrees();
        let initial_launch_velocity_km_s = self.horizontal_speed_km_s.hypot(initial_vertical_velocity_km_s);
        let slant_range_km = ground_distance_km.hypot(intercept_altitude_km);
        let launch_bearing_deg = earth.initial_bearing(&self.launch_point, &intercept_point)?;

        let solution = InterceptSolution {
            intercept_point,
            intercept_altitude_km,
            target_elapsed_s,
            intercept_time_abs,
            launch_time_abs,
            flight_time_s,
            ground_distance_km,
            launch_bearing_deg,
            initial_vertical_velocity_km_s,
            initial_launch_velocity_km_s,
            launch_elevation_deg,
            slant_range_km,
        };

        info!(
            "迎撃解算: {} -> {} 迎撃点 {} 高度 {:.2} km, 発射 {:.2} 秒, 迎撃 {:.2} 秒",
            self.id, missile.id(), intercept_point, intercept_altitude_km, launch_time_abs, intercept_time_abs
        );
        debug!(
            "{}: 地上距離 {:.2} km, 鉛直初速 {:.4} km/s, 発射仰角 {:.2} 度",
            self.id, ground_distance_km, initial_vertical_velocity_km_s, launch_elevation_deg
        );

        Ok(SolvedInterceptor {
            interceptor: self.clone(),
            solution,
            gravity_km_s2: gravity,
            earth,
        })
    }
}

/// 解算済みの迎撃ミサイル
///
/// 発射地点から迎撃点まで大圏経路上を等速で進み、迎撃時刻にちょうど迎撃高度へ達する放物線軌道です。
#[derive(Debug, Clone)]
pub struct SolvedInterceptor {
    interceptor: Interceptor,
    solution: InterceptSolution,
    gravity_km_s2: f64,
    earth: SphericalEarth,
}

impl SolvedInterceptor {
    pub fn solution(&self) -> &InterceptSolution {
        &self.solution
    }

    pub fn generate(&self, time_step_s: f64) -> Result<SampleIter<'_, Self>, TrajectoryError> {
        SampleIter::new(self, time_step_s)
    }
}

impl ITrajectory for SolvedInterceptor {
    fn get_id(&self) -> &str {
        &self.interceptor.id
    }

    fn launch_time_abs(&self) -> f64 {
        self.solution.launch_time_abs
    }

    fn flight_duration_s(&self) -> f64 {
        self.solution.flight_time_s
    }

    fn horizontal_speed_km_s(&self) -> f64 {
        self.interceptor.horizontal_speed_km_s
    }

    fn terminal_point(&self) -> GeoPoint {
        self.solution.intercept_point
    }

    fn position_at(&self, elapsed_s: f64) -> GeoPoint {
        let t = elapsed_s.clamp(0.0, self.solution.flight_time_s);
        self.earth.destination_point(
            &self.interceptor.launch_point,
            self.solution.launch_bearing_deg,
            self.interceptor.horizontal_speed_km_s * t,
        )
    }

    fn altitude_at(&self, elapsed_s: f64) -> f64 {
        let t = elapsed_s.clamp(0.0, self.solution.flight_time_s);
        let altitude = self.solution.initial_vertical_velocity_km_s * t - 0.5 * self.gravity_km_s2 * t * t;
        altitude.max(0.0)
    }

    fn vertical_velocity_at(&self, elapsed_s: f64) -> f64 {
        self.solution.initial_vertical_velocity_km_s - self.gravity_km_s2 * elapsed_s
    }

    fn earth(&self) -> &SphericalEarth {
        &self.earth
    }
}
