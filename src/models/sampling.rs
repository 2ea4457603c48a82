//! 軌道サンプリング / 出力アダプタ
//!
//! `ITrajectory` を実装した任意の飛翔体から、出力処理に渡す統一形式の
//! `TrajectorySample` 列を生成します。
//!
//! - 時刻は厳密に昇順、重複なし
//! - 刻みの倍数でなくても終端時刻のサンプルを必ず1点追加
//! - 終端サンプルの方位は直前サンプルの方位を引き継ぐ
//!   （残り経路長0から方位を計算すると180度反転するため）

use crate::models::common::{math_utils, TrajectorySample};
use crate::models::error::TrajectoryError;
use crate::models::traits::ITrajectory;

/// 終端時刻との重複とみなす相対許容誤差
const BOUNDARY_EPSILON: f64 = 1e-9;

/// 遅延評価のサンプル列
///
/// 飛翔体と刻み幅だけで決まる純粋な列で、何度作り直しても同じ結果になります。
pub struct SampleIter<'a, T: ITrajectory + ?Sized> {
    producer: &'a T,
    step_s: f64,
    stop_s: f64,
    index: u64,
    previous_bearing: Option<f64>,
    finished: bool,
}

impl<'a, T: ITrajectory + ?Sized> SampleIter<'a, T> {
    /// 発射から終端までのサンプル列を作成
    pub fn new(producer: &'a T, step_s: f64) -> Result<Self, TrajectoryError> {
        Self::until(producer, step_s, producer.flight_duration_s())
    }

    /// 発射から `stop_s`（経過時間）までのサンプル列を作成
    ///
    /// `stop_s` は [0, 飛翔時間] に丸められます。
    pub fn until(producer: &'a T, step_s: f64, stop_s: f64) -> Result<Self, TrajectoryError> {
        if !step_s.is_finite() || step_s <= 0.0 {
            return Err(TrajectoryError::InvalidTimeStep(step_s));
        }
        let duration = producer.flight_duration_s();
        let stop_s = if stop_s.is_finite() { stop_s.clamp(0.0, duration) } else { duration };

        Ok(Self {
            producer,
            step_s,
            stop_s,
            index: 0,
            previous_bearing: None,
            finished: false,
        })
    }

    fn sample_at(&mut self, elapsed_s: f64, is_final: bool) -> TrajectorySample {
        let producer = self.producer;
        let position = producer.position_at(elapsed_s);

        let bearing = match self.previous_bearing {
            Some(previous) if is_final => Some(previous),
            previous => producer
                .earth()
                .initial_bearing(&position, &producer.terminal_point())
                .ok()
                .or(previous),
        };
        let bearing_deg = bearing.unwrap_or(0.0);
        self.previous_bearing = Some(bearing_deg);

        let flight_path_deg = producer
            .vertical_velocity_at(elapsed_s)
            .atan2(producer.horizontal_speed_km_s())
            .to_degrees();

        TrajectorySample {
            time_abs: producer.launch_time_abs() + elapsed_s,
            elapsed_s,
            position,
            altitude_km: producer.altitude_at(elapsed_s),
            bearing_deg,
            tilt_deg: math_utils::flight_path_to_tilt(flight_path_deg),
        }
    }
}

impl<T: ITrajectory + ?Sized> Iterator for SampleIter<'_, T> {
    type Item = TrajectorySample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let elapsed_s = self.index as f64 * self.step_s;
        let epsilon = BOUNDARY_EPSILON * self.stop_s.max(1.0);
        if elapsed_s < self.stop_s - epsilon {
            self.index += 1;
            return Some(self.sample_at(elapsed_s, false));
        }

        self.finished = true;
        let stop_s = self.stop_s;
        Some(self.sample_at(stop_s, true))
    }
}

/// 飛翔体の全軌道をサンプル列に変換
pub fn to_samples<T: ITrajectory + ?Sized>(
    producer: &T,
    step_s: f64,
) -> Result<Vec<TrajectorySample>, TrajectoryError> {
    Ok(SampleIter::new(producer, step_s)?.collect())
}

/// 飛翔体の軌道を `stop_s` までサンプル列に変換
pub fn to_samples_until<T: ITrajectory + ?Sized>(
    producer: &T,
    step_s: f64,
    stop_s: f64,
) -> Result<Vec<TrajectorySample>, TrajectoryError> {
    Ok(SampleIter::until(producer, step_s, stop_s)?.collect())
}

/// 時刻が厳密に昇順かどうか
pub fn is_strictly_increasing(samples: &[TrajectorySample]) -> bool {
    samples.windows(2).all(|w| w[0].time_abs < w[1].time_abs)
}
