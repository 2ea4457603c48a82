//! # Simulation モジュール
//!
//! 設定された各シミュレーション（弾道ミサイル1発とその迎撃ミサイル群）を計算し、
//! 出力処理へ渡すまでのパイプラインを提供します。
//!
//! ## 処理順序
//!
//! 各シミュレーションにつき、以下の順序で処理が実行されます：
//!
//! 1. **弾道ミサイル構築**: 派生値（大圏距離、飛翔時間、頂点時刻、鉛直初速）の計算
//! 2. **迎撃解算**: 迎撃ミサイルごとに独立して会合点と発射時刻を解算
//! 3. **サンプリング**: 各飛翔体の航跡を固定刻みのサンプル列に変換
//! 4. **出力**: 航跡CSVとレポートの書き出し
//!
//! シミュレーション同士は状態を共有しないため、1〜3はシミュレーション単位で並列に実行します。
//! あるシミュレーションの失敗は他のシミュレーションに影響しません。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! let config = ScenarioConfig::from_file("scenarios/equator_demo.yaml")?;
//! let engine = SimulationEngine::new(config, 1);
//! let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
//! let outcomes = runtime.block_on(engine.run());
//! let report = engine.export(&outcomes, &mut CsvTrackExporter::new("output"));
//! ```

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::export::{ExportError, TrackExporter};
use crate::models::*;
use crate::scenario::{ScenarioConfig, SimulationCase, SimulationConfig};

#[derive(Error, Debug, Clone)]
pub enum SimulationError {
    #[error(transparent)]
    Model(#[from] TrajectoryError),

    #[error("シミュレーションタスク異常終了: {0}")]
    Task(String),
}

/// 弾道ミサイルの派生値
#[derive(Debug, Clone, Serialize)]
pub struct MissileSummary {
    pub id: String,
    pub launch_time_abs: f64,
    pub great_circle_distance_km: f64,
    pub launch_bearing_deg: f64,
    pub total_flight_time_s: f64,
    pub apogee_time_s: f64,
    pub apogee_altitude_km: f64,
    pub initial_vertical_velocity_km_s: f64,
    pub initial_launch_velocity_km_s: f64,
    pub launch_elevation_deg: f64,
}

impl From<&BallisticMissile> for MissileSummary {
    fn from(missile: &BallisticMissile) -> Self {
        Self {
            id: missile.id().to_string(),
            launch_time_abs: missile.launch_time_abs(),
            great_circle_distance_km: missile.great_circle_distance_km(),
            launch_bearing_deg: missile.launch_bearing_deg(),
            total_flight_time_s: missile.total_flight_time_s(),
            apogee_time_s: missile.apogee_time_s(),
            apogee_altitude_km: missile.apogee_altitude_km(),
            initial_vertical_velocity_km_s: missile.initial_vertical_velocity_km_s(),
            initial_launch_velocity_km_s: missile.initial_launch_velocity_km_s(),
            launch_elevation_deg: missile.launch_elevation_deg(),
        }
    }
}

/// 迎撃ミサイル1発分の解算結果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InterceptorOutcome {
    Solved { id: String, solution: InterceptSolution },
    Failed { id: String, error: String },
}

impl InterceptorOutcome {
    pub fn id(&self) -> &str {
        match self {
            InterceptorOutcome::Solved { id, .. } | InterceptorOutcome::Failed { id, .. } => id,
        }
    }

    pub fn solution(&self) -> Option<&InterceptSolution> {
        match self {
            InterceptorOutcome::Solved { solution, .. } => Some(solution),
            InterceptorOutcome::Failed { .. } => None,
        }
    }
}

/// 1飛翔体分の航跡
#[derive(Debug, Clone)]
pub struct ProjectileTrack {
    pub projectile_id: String,
    pub samples: Vec<TrajectorySample>,
}

/// 成功したシミュレーションの結果
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub missile: MissileSummary,
    pub interceptors: Vec<InterceptorOutcome>,
    /// 弾道ミサイル、解算に成功した迎撃ミサイルの順
    pub tracks: Vec<ProjectileTrack>,
}

/// シミュレーション1件の実行結果
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub case_id: String,
    pub group: String,
    pub result: Result<SimulationResult, SimulationError>,
}

/// レポート用のシミュレーション結果
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub id: String,
    pub group: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missile: Option<MissileSummary>,
    pub interceptors: Vec<InterceptorOutcome>,
    pub track_files: Vec<String>,
}

/// 実行全体のレポート
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub time_step_s: f64,
    pub simulations: Vec<SimulationReport>,
}

impl RunReport {
    pub fn failed_count(&self) -> usize {
        self.simulations.iter().filter(|s| s.error.is_some()).count()
    }
}

/// 1シミュレーションを計算
///
/// 弾道ミサイルの構築に失敗した場合はシミュレーション全体が失敗となり、航跡は一切出力しません。
/// 迎撃ミサイルの解算失敗はその迎撃ミサイルだけの失敗として記録します。
pub fn run_simulation(
    case: &SimulationCase,
    sim: &SimulationConfig,
    time_step_s: f64,
) -> Result<SimulationResult, TrajectoryError> {
    let missile = case.build_missile(sim)?;
    let constraints = InterceptConstraints {
        earliest_launch_time_abs: sim.epoch_start_s,
    };

    let mut outcomes = Vec::with_capacity(case.interceptors.len());
    let mut solved = Vec::new();
    for config in &case.interceptors {
        match case
            .build_interceptor(config)
            .and_then(|interceptor| interceptor.solve(&missile, &constraints))
        {
            Ok(s) => {
                outcomes.push(InterceptorOutcome::Solved {
                    id: config.id.clone(),
                    solution: *s.solution(),
                });
                solved.push(s);
            }
            Err(e) => {
                warn!("{}: 迎撃ミサイル {} の解算に失敗: {}", case.id, config.id, e);
                outcomes.push(InterceptorOutcome::Failed {
                    id: config.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    // 最早迎撃時刻で弾道ミサイルの航跡を打ち切る
    let earliest_intercept = solved
        .iter()
        .map(|s| s.solution().target_elapsed_s)
        .min_by(|a, b| a.total_cmp(b));
    let missile_samples = match earliest_intercept {
        Some(stop_s) if sim.truncate_at_intercept => to_samples_until(&missile, time_step_s, stop_s)?,
        _ => to_samples(&missile, time_step_s)?,
    };

    let mut tracks = vec![ProjectileTrack {
        projectile_id: missile.id().to_string(),
        samples: missile_samples,
    }];
    for s in &solved {
        tracks.push(ProjectileTrack {
            projectile_id: s.get_id().to_string(),
            samples: to_samples(s, time_step_s)?,
        });
    }

    debug!(
        "{}: 航跡 {}本, 迎撃成功 {}/{}",
        case.id,
        tracks.len(),
        solved.len(),
        case.interceptors.len()
    );

    Ok(SimulationResult {
        missile: MissileSummary::from(&missile),
        interceptors: outcomes,
        tracks,
    })
}

pub struct SimulationEngine {
    pub scenario: Arc<ScenarioConfig>,
    pub time_step_s: f64,
    pub verbose_level: u8,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let time_step_s = scenario.sim.time_step_s;
        Self {
            scenario: Arc::new(scenario),
            time_step_s,
            verbose_level,
        }
    }

    /// サンプリング刻みを上書き
    pub fn with_time_step(mut self, time_step_s: f64) -> Self {
        self.time_step_s = time_step_s;
        self
    }

    /// 全シミュレーションを順に計算
    #[cfg(test)]
    pub fn run_sequential(&self) -> Vec<SimulationOutcome> {
        self.scenario
            .simulations
            .iter()
            .map(|case| SimulationOutcome {
                case_id: case.id.clone(),
                group: case.group.clone(),
                result: run_simulation(case, &self.scenario.sim, self.time_step_s).map_err(SimulationError::from),
            })
            .inspect(|outcome| self.log_outcome(outcome))
            .collect()
    }

    /// 全シミュレーションを並列に計算
    ///
    /// シミュレーションごとにブロッキングタスクを起動し、設定順に結果を回収します。
    pub async fn run(&self) -> Vec<SimulationOutcome> {
        info!("=== シミュレーション実行開始 ({}件) ===", self.scenario.simulations.len());

        let handles: Vec<_> = (0..self.scenario.simulations.len())
            .map(|index| {
                let scenario = Arc::clone(&self.scenario);
                let time_step_s = self.time_step_s;
                tokio::task::spawn_blocking(move || {
                    let case = &scenario.simulations[index];
                    run_simulation(case, &scenario.sim, time_step_s)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (case, handle) in self.scenario.simulations.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result.map_err(SimulationError::from),
                Err(e) => Err(SimulationError::Task(e.to_string())),
            };
            let outcome = SimulationOutcome {
                case_id: case.id.clone(),
                group: case.group.clone(),
                result,
            };
            self.log_outcome(&outcome);
            outcomes.push(outcome);
        }

        info!("=== シミュレーション完了 ===");
        outcomes
    }

    fn log_outcome(&self, outcome: &SimulationOutcome) {
        match &outcome.result {
            Ok(result) => {
                if self.verbose_level > 0 {
                    info!(
                        "{}: {} 飛翔時間 {:.1}秒, 頂点高度 {:.1} km",
                        outcome.case_id,
                        result.missile.id,
                        result.missile.total_flight_time_s,
                        result.missile.apogee_altitude_km
                    );
                }
                for interceptor in &result.interceptors {
                    if let Some(s) = interceptor.solution() {
                        if self.verbose_level > 0 {
                            info!(
                                "  {}: 発射 {:.1}秒, 迎撃 {:.1}秒, 仰角 {:.1}度",
                                interceptor.id(),
                                s.launch_time_abs,
                                s.intercept_time_abs,
                                s.launch_elevation_deg
                            );
                        }
                    }
                }
            }
            Err(e) => error!("シミュレーション {} 失敗: {}", outcome.case_id, e),
        }
    }

    /// 成功したシミュレーションの航跡を書き出し、レポートを作成
    ///
    /// 書き出しに失敗したシミュレーションはレポート上で失敗として記録し、残りの出力を続けます。
    pub fn export(&self, outcomes: &[SimulationOutcome], exporter: &mut dyn TrackExporter) -> RunReport {
        let simulations = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(result) => {
                    let mut track_files = Vec::with_capacity(result.tracks.len());
                    let written = result.tracks.iter().try_for_each(|track| {
                        let path = exporter.write_track(&outcome.group, &track.projectile_id, &track.samples)?;
                        track_files.push(path.display().to_string());
                        Ok::<(), ExportError>(())
                    });
                    let error = written.err().map(|e| {
                        error!("シミュレーション {} の出力に失敗: {}", outcome.case_id, e);
                        e.to_string()
                    });
                    SimulationReport {
                        id: outcome.case_id.clone(),
                        group: outcome.group.clone(),
                        status: if error.is_some() { "failed" } else { "ok" }.to_string(),
                        error,
                        missile: Some(result.missile.clone()),
                        interceptors: result.interceptors.clone(),
                        track_files,
                    }
                }
                Err(e) => SimulationReport {
                    id: outcome.case_id.clone(),
                    group: outcome.group.clone(),
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                    missile: None,
                    interceptors: Vec::new(),
                    track_files: Vec::new(),
                },
            })
            .collect();

        RunReport {
            scenario: self.scenario.meta.name.clone(),
            time_step_s: self.time_step_s,
            simulations,
        }
    }
}
