use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::models::{
    BallisticMissile, BallisticParams, GeoPoint, Interceptor, SphericalEarth, TrajectoryError,
    EARTH_MEAN_RADIUS_KM, STANDARD_GRAVITY_KM_S2,
};

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション共通設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// サンプリング刻み（秒）
    pub time_step_s: f64,
    /// 迎撃ミサイルの最早発射時刻（秒）
    #[serde(default)]
    pub epoch_start_s: f64,
    #[serde(default = "default_earth_radius_km")]
    pub earth_radius_km: f64,
    /// 弾道ミサイルの重力加速度の既定値（km/s²）
    #[serde(default = "default_gravity_km_s2")]
    pub gravity_km_s2: f64,
    /// 迎撃された弾道ミサイルの航跡を最早迎撃時刻で打ち切るか
    #[serde(default = "default_true")]
    pub truncate_at_intercept: bool,
}

fn default_earth_radius_km() -> f64 {
    EARTH_MEAN_RADIUS_KM
}

fn default_gravity_km_s2() -> f64 {
    STANDARD_GRAVITY_KM_S2
}

fn default_true() -> bool {
    true
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step_s: 1.0,
            epoch_start_s: 0.0,
            earth_radius_km: EARTH_MEAN_RADIUS_KM,
            gravity_km_s2: STANDARD_GRAVITY_KM_S2,
            truncate_at_intercept: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LatLonConfig {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl LatLonConfig {
    pub fn to_geo_point(&self) -> Result<GeoPoint, TrajectoryError> {
        GeoPoint::new(self.lat_deg, self.lon_deg)
    }
}

/// 弾道ミサイル設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissileConfig {
    pub id: String,
    pub launch_point: LatLonConfig,
    pub aim_point: LatLonConfig,
    pub horizontal_speed_km_s: f64,
    /// 未指定なら `sim.gravity_km_s2`
    #[serde(default)]
    pub gravity_km_s2: Option<f64>,
    #[serde(default)]
    pub launch_time_s: f64,
}

/// 迎撃ミサイル設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptorConfig {
    pub id: String,
    pub launch_point: LatLonConfig,
    pub horizontal_speed_km_s: f64,
    /// 未指定なら同じシミュレーションの弾道ミサイル
    #[serde(default)]
    pub target_missile_id: Option<String>,
    #[serde(default)]
    pub standoff_distance_km: f64,
    #[serde(default)]
    pub max_ground_range_km: Option<f64>,
}

/// 1シミュレーション分の設定（弾道ミサイル1発と迎撃ミサイル群）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationCase {
    pub id: String,
    /// 出力フォルダをまとめるグループ名
    #[serde(default = "default_group")]
    pub group: String,
    pub missile: MissileConfig,
    #[serde(default)]
    pub interceptors: Vec<InterceptorConfig>,
}

fn default_group() -> String {
    "default".to_string()
}

impl SimulationCase {
    /// 弾道ミサイルモデルを構築
    pub fn build_missile(&self, sim: &SimulationConfig) -> Result<BallisticMissile, TrajectoryError> {
        let params = BallisticParams {
            launch_point: self.missile.launch_point.to_geo_point()?,
            aim_point: self.missile.aim_point.to_geo_point()?,
            horizontal_speed_km_s: self.missile.horizontal_speed_km_s,
            gravity_km_s2: self.missile.gravity_km_s2.unwrap_or(sim.gravity_km_s2),
            launch_time_abs: self.missile.launch_time_s,
        };
        BallisticMissile::new(self.missile.id.clone(), params, SphericalEarth::new(sim.earth_radius_km))
    }

    /// 迎撃ミサイルモデルを構築
    pub fn build_interceptor(&self, config: &InterceptorConfig) -> Result<Interceptor, TrajectoryError> {
        let target = config
            .target_missile_id
            .clone()
            .unwrap_or_else(|| self.missile.id.clone());
        let interceptor = Interceptor::new(
            config.id.clone(),
            config.launch_point.to_geo_point()?,
            config.horizontal_speed_km_s,
            target,
            config.standoff_distance_km,
        )?;
        match config.max_ground_range_km {
            Some(range) => interceptor.with_max_ground_range(range),
            None => Ok(interceptor),
        }
    }
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    #[serde(default)]
    pub sim: SimulationConfig,
    pub simulations: Vec<SimulationCase>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        // ファイル読み込み
        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        // YAML解析
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        // 基本的な検証
        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError("<inline>".into(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の基本的な検証
    ///
    /// 点の一致など物理的な前提条件はモデル側で検出し、そのシミュレーションだけを失敗させます。
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !is_positive_finite(self.sim.time_step_s) {
            return Err(ScenarioError::ValidationError("time_step_s must be positive and finite".to_string()));
        }
        if !is_positive_finite(self.sim.earth_radius_km) {
            return Err(ScenarioError::ValidationError("earth_radius_km must be positive and finite".to_string()));
        }
        if !is_positive_finite(self.sim.gravity_km_s2) {
            return Err(ScenarioError::ValidationError("gravity_km_s2 must be positive and finite".to_string()));
        }
        if !self.sim.epoch_start_s.is_finite() {
            return Err(ScenarioError::ValidationError("epoch_start_s must be finite".to_string()));
        }
        if self.simulations.is_empty() {
            return Err(ScenarioError::ValidationError("no simulations defined".to_string()));
        }

        let mut sim_ids = HashSet::new();
        // 航跡ファイルは <グループ>/<飛翔体ID>.csv なので、IDはグループ内で一意
        let mut group_projectiles: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
        for case in &self.simulations {
            if !sim_ids.insert(case.id.as_str()) {
                return Err(ScenarioError::ValidationError(format!("duplicate simulation id {}", case.id)));
            }
            check_path_component("group", &case.group)?;

            let projectiles = group_projectiles.entry(case.group.as_str()).or_default();
            let ids = std::iter::once(case.missile.id.as_str()).chain(case.interceptors.iter().map(|i| i.id.as_str()));
            for id in ids {
                check_path_component("projectile id", id)?;
                if let Some(other) = projectiles.insert(id, case.id.as_str()) {
                    return Err(ScenarioError::ValidationError(format!(
                        "group {}: duplicate projectile id {} (simulations {} and {})",
                        case.group, id, other, case.id
                    )));
                }
            }

            let points = std::iter::once(&case.missile.launch_point)
                .chain(std::iter::once(&case.missile.aim_point))
                .chain(case.interceptors.iter().map(|i| &i.launch_point));
            for point in points {
                if let Err(e) = point.to_geo_point() {
                    return Err(ScenarioError::ValidationError(format!("simulation {}: {}", case.id, e)));
                }
            }
        }

        Ok(())
    }

    /// 総飛翔体数
    pub fn projectile_count(&self) -> usize {
        self.simulations.iter().map(|c| 1 + c.interceptors.len()).sum()
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.time_step_s);
        println!("最早発射時刻: {:.1}秒", self.sim.epoch_start_s);
        println!("地球半径: {:.1} km", self.sim.earth_radius_km);
        println!("重力加速度: {:.4} km/s²", self.sim.gravity_km_s2);
        println!();

        println!("=== シミュレーション ===");
        println!("シミュレーション数: {}", self.simulations.len());
        println!("総飛翔体数: {}", self.projectile_count());
        for case in &self.simulations {
            println!(
                "  {} [{}]: {} (迎撃ミサイル {}発)",
                case.id,
                case.group,
                case.missile.id,
                case.interceptors.len()
            );
        }
    }
}

fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// 出力パスの1要素として使える名前か検証
fn check_path_component(kind: &str, name: &str) -> Result<(), ScenarioError> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', ':'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(ScenarioError::ValidationError(format!("invalid {} '{}'", kind, name)));
    }
    Ok(())
}

/// シナリオ読み込みエラー
#[derive(Debug)]
pub enum ScenarioError {
    FileNotFound(std::path::PathBuf),
    IoError(std::path::PathBuf, std::io::Error),
    ParseError(std::path::PathBuf, serde_yaml::Error),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::FileNotFound(path) => {
                write!(f, "シナリオファイルが見つかりません: {}", path.display())
            }
            ScenarioError::IoError(path, err) => {
                write!(f, "ファイル読み込みエラー {}: {}", path.display(), err)
            }
            ScenarioError::ParseError(path, err) => {
                write!(f, "YAML解析エラー {}: {}", path.display(), err)
            }
            ScenarioError::ValidationError(msg) => {
                write!(f, "設定検証エラー: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

#[cfg(test)]
mod tests {
    use super::*;

    const EQUATOR_YAML: &str = r#"
meta:
  version: "1.0"
  name: equator
sim:
  time_step_s: 5.0
simulations:
  - id: sim01
    group: demo
    missile:
      id: BM1
      launch_point: { lat_deg: 0.0, lon_deg: 0.0 }
      aim_point: { lat_deg: 0.0, lon_deg: 10.0 }
      horizontal_speed_km_s: 2.0
    interceptors:
      - id: INT1
        launch_point: { lat_deg: 0.0, lon_deg: 5.0 }
        horizontal_speed_km_s: 3.0
        target_missile_id: BM1
        standoff_distance_km: 50.0
      - id: INT2
        launch_point: { lat_deg: 1.0, lon_deg: 6.0 }
        horizontal_speed_km_s: 3.0
        max_ground_range_km: 800.0
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ScenarioConfig::from_yaml_str(EQUATOR_YAML).unwrap();
        assert_eq!(config.sim.time_step_s, 5.0);
        assert_eq!(config.sim.earth_radius_km, EARTH_MEAN_RADIUS_KM);
        assert_eq!(config.sim.gravity_km_s2, STANDARD_GRAVITY_KM_S2);
        assert!(config.sim.truncate_at_intercept);
        assert_eq!(config.projectile_count(), 3);

        let case = &config.simulations[0];
        assert_eq!(case.group, "demo");
        assert_eq!(case.interceptors[1].standoff_distance_km, 0.0);
        assert_eq!(case.interceptors[1].max_ground_range_km, Some(800.0));
    }

    #[test]
    fn test_build_models() {
        let config = ScenarioConfig::from_yaml_str(EQUATOR_YAML).unwrap();
        let case = &config.simulations[0];
        let missile = case.build_missile(&config.sim).unwrap();
        assert!((missile.great_circle_distance_km() - 1111.95).abs() < 0.01);

        // target_missile_id 省略時は同じシミュレーションのミサイルを狙う
        let int2 = case.build_interceptor(&case.interceptors[1]).unwrap();
        assert_eq!(int2.target_missile_id, "BM1");
        assert_eq!(int2.max_ground_range_km, Some(800.0));
    }

    #[test]
    fn test_missile_gravity_override() {
        let yaml = EQUATOR_YAML.replace("horizontal_speed_km_s: 2.0", "horizontal_speed_km_s: 2.0\n      gravity_km_s2: 0.005");
        let config = ScenarioConfig::from_yaml_str(&yaml).unwrap();
        let missile = config.simulations[0].build_missile(&config.sim).unwrap();
        assert_eq!(missile.gravity_km_s2(), 0.005);
    }

    #[test]
    fn test_validation_errors() {
        let bad_step = EQUATOR_YAML.replace("time_step_s: 5.0", "time_step_s: 0.0");
        assert!(matches!(
            ScenarioConfig::from_yaml_str(&bad_step),
            Err(ScenarioError::ValidationError(_))
        ));

        let dup = EQUATOR_YAML.replace("id: INT2", "id: INT1");
        assert!(matches!(ScenarioConfig::from_yaml_str(&dup), Err(ScenarioError::ValidationError(_))));

        let bad_lat = EQUATOR_YAML.replace("lat_deg: 1.0", "lat_deg: 91.0");
        assert!(matches!(
            ScenarioConfig::from_yaml_str(&bad_lat),
            Err(ScenarioError::ValidationError(_))
        ));
    }

    #[test]
    fn test_non_finite_settings_rejected() {
        for (from, to) in [
            ("time_step_s: 5.0", "time_step_s: .inf"),
            ("time_step_s: 5.0", "time_step_s: 5.0\n  earth_radius_km: .inf"),
            ("time_step_s: 5.0", "time_step_s: 5.0\n  gravity_km_s2: .inf"),
            ("time_step_s: 5.0", "time_step_s: .nan"),
        ] {
            let yaml = EQUATOR_YAML.replace(from, to);
            assert!(
                matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::ValidationError(_))),
                "{}",
                to
            );
        }
    }

    const TWO_SIMULATIONS_YAML: &str = r#"
meta:
  version: "1.0"
  name: two
sim:
  time_step_s: 5.0
simulations:
  - id: a
    group: g
    missile:
      id: BM1
      launch_point: { lat_deg: 0.0, lon_deg: 0.0 }
      aim_point: { lat_deg: 0.0, lon_deg: 10.0 }
      horizontal_speed_km_s: 2.0
  - id: b
    group: g
    missile:
      id: BM2
      launch_point: { lat_deg: 40.0, lon_deg: 40.0 }
      aim_point: { lat_deg: 45.0, lon_deg: 50.0 }
      horizontal_speed_km_s: 2.0
"#;

    #[test]
    fn test_projectile_ids_unique_within_group() {
        assert!(ScenarioConfig::from_yaml_str(TWO_SIMULATIONS_YAML).is_ok());

        // 同じグループの別シミュレーションで同じIDを使うと航跡ファイルが衝突する
        let same_id = TWO_SIMULATIONS_YAML.replace("id: BM2", "id: BM1");
        match ScenarioConfig::from_yaml_str(&same_id) {
            Err(ScenarioError::ValidationError(msg)) => assert!(msg.contains("BM1"), "{}", msg),
            other => panic!("unexpected: {:?}", other.map(|c| c.simulations.len())),
        }

        // 迎撃ミサイルIDと別シミュレーションの弾道ミサイルIDの衝突も同様
        let interceptor_clash = format!(
            "{}    interceptors:\n      - id: BM1\n        launch_point: {{ lat_deg: 44.0, lon_deg: 48.0 }}\n        horizontal_speed_km_s: 3.0\n",
            TWO_SIMULATIONS_YAML
        );
        assert!(matches!(
            ScenarioConfig::from_yaml_str(&interceptor_clash),
            Err(ScenarioError::ValidationError(_))
        ));

        // グループが異なれば出力先も異なる
        let other_group = same_id.replacen("group: g\n    missile:\n      id: BM1\n      launch_point: { lat_deg: 40.0", "group: h\n    missile:\n      id: BM1\n      launch_point: { lat_deg: 40.0", 1);
        assert!(ScenarioConfig::from_yaml_str(&other_group).is_ok());
    }

    #[test]
    fn test_unsafe_path_names_rejected() {
        for (from, to) in [
            ("id: BM1", "id: BAD/ID"),
            ("id: BM1", "id: ..\\\\up"),
            ("id: BM1", "id: \"..\""),
            ("id: BM1", "id: \"\""),
            ("group: g\n    missile:\n      id: BM2", "group: ../escape\n    missile:\n      id: BM2"),
            ("group: g\n    missile:\n      id: BM2", "group: a/b\n    missile:\n      id: BM2"),
        ] {
            let yaml = TWO_SIMULATIONS_YAML.replacen(from, to, 1);
            assert_ne!(yaml, TWO_SIMULATIONS_YAML);
            assert!(
                matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::ValidationError(_))),
                "{}",
                to
            );
        }
    }

    #[test]
    fn test_parse_error_and_missing_file() {
        assert!(matches!(
            ScenarioConfig::from_yaml_str("meta: [unclosed"),
            Err(ScenarioError::ParseError(_, _))
        ));
        assert!(matches!(
            ScenarioConfig::from_file("no/such/scenario.yaml"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_degenerate_missile_fails_at_build_not_load() {
        let yaml = EQUATOR_YAML.replace("aim_point: { lat_deg: 0.0, lon_deg: 10.0 }", "aim_point: { lat_deg: 0.0, lon_deg: 0.0 }");
        let config = ScenarioConfig::from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            config.simulations[0].build_missile(&config.sim),
            Err(TrajectoryError::InvalidMissileConfig { .. })
        ));
    }
}
