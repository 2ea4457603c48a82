use thiserror::Error;

/// 迎撃が成立しない理由
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InfeasibleReason {
    /// 指定されたターゲットIDと渡された弾道ミサイルが一致しない
    TargetMismatch,
    /// 迎撃ミサイルの飛翔時間が迎撃時刻より長く、脅威の発射前に発射する必要がある
    LaunchPrecedesThreat,
    /// 発射時刻が許容される最早発射時刻より前
    BeforeEarliestLaunch,
    /// 地上距離が最大射程を超える
    OutOfGroundRange,
    /// 発射地点が迎撃地点と一致している
    ZeroGroundDistance,
}

impl std::fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            InfeasibleReason::TargetMismatch => "target missile id mismatch",
            InfeasibleReason::LaunchPrecedesThreat => "interceptor would launch before the threat",
            InfeasibleReason::BeforeEarliestLaunch => "launch time precedes earliest permissible time",
            InfeasibleReason::OutOfGroundRange => "intercept point outside interceptor ground range",
            InfeasibleReason::ZeroGroundDistance => "interceptor launch point coincides with intercept point",
        };
        f.write_str(text)
    }
}

/// 軌道計算・迎撃解算のエラー
///
/// すべて入力検証由来の決定的な失敗であり、リトライは行いません。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("invalid coordinate: lat={lat_deg}, lon={lon_deg}")]
    InvalidCoordinate { lat_deg: f64, lon_deg: f64 },

    #[error("invalid missile config [{id}]: {reason}")]
    InvalidMissileConfig { id: String, reason: String },

    #[error("invalid interceptor config [{id}]: {reason}")]
    InvalidInterceptorConfig { id: String, reason: String },

    #[error("degenerate geometry: bearing between coincident points is undefined")]
    DegenerateGeometry,

    #[error("invalid time step: {0}")]
    InvalidTimeStep(f64),

    #[error(
        "unreachable standoff [{interceptor_id}]: standoff {standoff_km:.3} km >= path length {path_km:.3} km"
    )]
    UnreachableStandoff {
        interceptor_id: String,
        standoff_km: f64,
        path_km: f64,
    },

    #[error("infeasible intercept [{interceptor_id}]: {reason} ({detail})")]
    InfeasibleIntercept {
        interceptor_id: String,
        reason: InfeasibleReason,
        detail: String,
    },
}

impl TrajectoryError {
    pub(crate) fn infeasible(
        interceptor_id: &str,
        reason: InfeasibleReason,
        detail: impl Into<String>,
    ) -> Self {
        TrajectoryError::InfeasibleIntercept {
            interceptor_id: interceptor_id.to_string(),
            reason,
            detail: detail.into(),
        }
    }
}
