use crate::models::common::GeoPoint;
use crate::models::geodesy::SphericalEarth;

/// 軌道を生成する飛翔体の共通インターフェース
///
/// 弾道ミサイルと迎撃ミサイルの両方が実装し、サンプリング層はこのtraitだけを見て
/// 出力用のサンプル列を組み立てます。時刻引数はすべて当該飛翔体の発射からの経過時間です。
pub trait ITrajectory {
    /// 飛翔体IDの取得
    fn get_id(&self) -> &str;

    /// 発射時刻（シミュレーション基準時刻からの秒）
    fn launch_time_abs(&self) -> f64;

    /// 発射から終端までの飛翔時間（秒）
    fn flight_duration_s(&self) -> f64;

    /// 一定の水平速度（km/s）
    fn horizontal_speed_km_s(&self) -> f64;

    /// 経路の終端点（弾着点または迎撃点）
    fn terminal_point(&self) -> GeoPoint;

    /// 経過時間における地表投影位置
    fn position_at(&self, elapsed_s: f64) -> GeoPoint;

    /// 経過時間における高度（km）
    fn altitude_at(&self, elapsed_s: f64) -> f64;

    /// 経過時間における鉛直速度（km/s、上向き正）
    fn vertical_velocity_at(&self, elapsed_s: f64) -> f64;

    /// 計算に使う地球モデル
    fn earth(&self) -> &SphericalEarth;
}
