// 基本的なデータ型と数学ユーティリティ
pub mod common;
pub mod error;

// 球面地球上の測地計算
pub mod geodesy;

// 軌道生成の共通インターフェース（trait）定義
pub mod traits;

// 各飛翔体モデルと出力用サンプリング
pub mod ballistic;
pub mod interceptor;
pub mod sampling;

// 便利な re-export
pub use common::*;
pub use error::{InfeasibleReason, TrajectoryError};
pub use geodesy::SphericalEarth;
pub use traits::*;
pub use ballistic::{BallisticMissile, BallisticParams};
pub use interceptor::{InterceptConstraints, InterceptSolution, Interceptor, SolvedInterceptor};
pub use sampling::{to_samples, to_samples_until, SampleIter};
