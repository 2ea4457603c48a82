//! # Export モジュール
//!
//! 計算済みのサンプル列をファイルへ書き出す外部協調部です。
//!
//! - 飛翔体ごとの航跡CSV（`<出力先>/<グループ>/<飛翔体ID>.csv`）
//! - 実行結果のYAMLレポート（`<出力先>/report.yaml`）
//!
//! 失敗したシミュレーション・迎撃ミサイルの航跡は書き出しません。

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::sampling::is_strictly_increasing;
use crate::models::TrajectorySample;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("出力エラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("レポート生成エラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("空の航跡は出力できません: {0}")]
    EmptyTrack(String),

    #[error("航跡の時刻が昇順ではありません: {0}")]
    UnorderedTrack(String),
}

/// 航跡の書き出し先
pub trait TrackExporter {
    /// 1飛翔体分の航跡を書き出す
    fn write_track(
        &mut self,
        group: &str,
        projectile_id: &str,
        samples: &[TrajectorySample],
    ) -> Result<PathBuf, ExportError>;
}

/// CSV形式の航跡出力
pub struct CsvTrackExporter {
    output_dir: PathBuf,
}

impl CsvTrackExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

/// CSVヘッダー
pub const CSV_HEADER: &str = "time_abs_s,elapsed_s,lat_deg,lon_deg,alt_km,bearing_deg,tilt_deg";

/// CSV行の作成
pub fn create_csv_row(sample: &TrajectorySample) -> String {
    format!(
        "{:.3},{:.3},{:.6},{:.6},{:.4},{:.3},{:.3}",
        sample.time_abs,
        sample.elapsed_s,
        sample.position.lat_deg(),
        sample.position.lon_deg(),
        sample.altitude_km,
        sample.bearing_deg,
        sample.tilt_deg
    )
}

/// CSVの書き込み
pub fn write_csv<W: Write>(writer: &mut W, samples: &[TrajectorySample]) -> Result<(), std::io::Error> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for sample in samples {
        writeln!(writer, "{}", create_csv_row(sample))?;
    }
    writer.flush()
}

impl TrackExporter for CsvTrackExporter {
    fn write_track(
        &mut self,
        group: &str,
        projectile_id: &str,
        samples: &[TrajectorySample],
    ) -> Result<PathBuf, ExportError> {
        if samples.is_empty() {
            return Err(ExportError::EmptyTrack(projectile_id.to_string()));
        }
        if !is_strictly_increasing(samples) {
            return Err(ExportError::UnorderedTrack(projectile_id.to_string()));
        }

        let dir = self.output_dir.join(group);
        fs::create_dir_all(&dir).map_err(|e| ExportError::Io(dir.clone(), e))?;

        let path = dir.join(format!("{}.csv", projectile_id));
        let file = File::create(&path).map_err(|e| ExportError::Io(path.clone(), e))?;
        let mut writer = BufWriter::new(file);
        write_csv(&mut writer, samples).map_err(|e| ExportError::Io(path.clone(), e))?;

        debug!("航跡出力: {} ({}点)", path.display(), samples.len());
        Ok(path)
    }
}

/// 実行結果レポートをYAMLで書き出す
pub fn write_report<T: Serialize, P: AsRef<Path>>(output_dir: P, report: &T) -> Result<PathBuf, ExportError> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).map_err(|e| ExportError::Io(output_dir.to_path_buf(), e))?;

    let path = output_dir.join("report.yaml");
    let contents = serde_yaml::to_string(report)?;
    fs::write(&path, contents).map_err(|e| ExportError::Io(path.clone(), e))?;

    info!("レポート出力: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    fn unique_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("interceptsim_{}_{}", name, std::process::id()))
    }

    fn sample(t: f64) -> TrajectorySample {
        TrajectorySample {
            time_abs: t,
            elapsed_s: t,
            position: GeoPoint::new(1.5, -2.25).unwrap(),
            altitude_km: 12.5,
            bearing_deg: 90.0,
            tilt_deg: 45.0,
        }
    }

    #[test]
    fn test_create_csv_row() {
        assert_eq!(
            create_csv_row(&sample(2.0)),
            "2.000,2.000,1.500000,-2.250000,12.5000,90.000,45.000"
        );
    }

    #[test]
    fn test_write_csv_in_memory() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[sample(0.0), sample(1.0)]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
    }

    #[test]
    fn test_write_track_to_group_folder() {
        let dir = unique_dir("track");
        let mut exporter = CsvTrackExporter::new(&dir);
        let path = exporter.write_track("demo", "BM1", &[sample(0.0), sample(1.0)]).unwrap();
        assert_eq!(path, dir.join("demo").join("BM1.csv"));
        assert!(fs::read_to_string(&path).unwrap().starts_with(CSV_HEADER));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_track_rejected() {
        let dir = unique_dir("empty");
        let mut exporter = CsvTrackExporter::new(&dir);
        assert!(matches!(
            exporter.write_track("demo", "BM1", &[]),
            Err(ExportError::EmptyTrack(_))
        ));
        assert!(!dir.join("demo").join("BM1.csv").exists());
    }

    #[test]
    fn test_unordered_track_rejected() {
        let dir = unique_dir("unordered");
        let mut exporter = CsvTrackExporter::new(&dir);
        for samples in [[sample(1.0), sample(0.0)], [sample(1.0), sample(1.0)]] {
            assert!(matches!(
                exporter.write_track("demo", "BM1", &samples),
                Err(ExportError::UnorderedTrack(_))
            ));
        }
        assert!(!dir.join("demo").join("BM1.csv").exists());
    }

    #[test]
    fn test_write_report() {
        #[derive(Serialize)]
        struct Dummy {
            name: String,
        }
        let dir = unique_dir("report");
        let path = write_report(&dir, &Dummy { name: "ok".to_string() }).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("name: ok"));
        fs::remove_dir_all(&dir).ok();
    }
}
