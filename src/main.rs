mod export;
mod logging;
mod models;
mod scenario;
mod simulation;

use clap::{Arg, ArgMatches, Command};
use std::str::FromStr;
use tracing::{error, info};

use export::{write_report, CsvTrackExporter};
use logging::{init_logging, level_from_verbosity, parse_log_level, LogConfig, LogOutput};
use scenario::ScenarioConfig;
use simulation::SimulationEngine;

/// `--demo` で実行する組み込みシナリオ
const DEMO_SCENARIO: &str = include_str!("../scenarios/equator_demo.yaml");

fn build_cli() -> Command {
    Command::new("interceptsim")
        .version("0.1.0")
        .about("弾道ミサイル・迎撃ミサイル軌道計算 (Ballistic / Interceptor Trajectory Simulation)")
        .long_about("球面地球上で弾道ミサイルの放物線軌道と迎撃ミサイルの会合点を計算し、\n\
                     時系列の航跡ファイルとして出力します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みの赤道デモシナリオを実行")
                .conflicts_with("scenario")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .default_value("output")
                .help("航跡ファイルとレポートの出力先")
        )
        .arg(
            Arg::new("step")
                .long("step")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(f64))
                .help("サンプリング刻みを上書き（秒）")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ")
        )
}

fn main() {
    let matches = build_cli().get_matches();
    std::process::exit(run_cli(&matches));
}

fn run_cli(matches: &ArgMatches) -> i32 {
    let verbose_level = matches.get_count("verbose");

    let log_output = match matches
        .get_one::<String>("log-output")
        .map(|s| LogOutput::from_str(s))
        .unwrap_or(Ok(LogOutput::Console))
    {
        Ok(output) => output,
        Err(e) => {
            eprintln!("エラー: {}", e);
            return 1;
        }
    };
    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|s| parse_log_level(s))
            .unwrap_or_else(|| level_from_verbosity(verbose_level)),
        output: log_output,
        log_dir: matches
            .get_one::<String>("log-dir")
            .cloned()
            .unwrap_or_else(|| "logs".to_string()),
        ..LogConfig::default()
    };
    // ガードは実行終了まで保持する
    let _guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("警告: ログ初期化に失敗しました: {}", e);
            None
        }
    };

    let scenario = if matches.get_flag("demo") {
        ScenarioConfig::from_yaml_str(DEMO_SCENARIO)
    } else if let Some(path) = matches.get_one::<String>("scenario") {
        ScenarioConfig::from_file(path)
    } else {
        show_default_help();
        return 0;
    };
    let scenario = match scenario {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("{}", e);
            eprintln!("エラー: {}", e);
            return 1;
        }
    };

    if matches.get_flag("info") {
        scenario.print_summary();
        return 0;
    }

    let output_dir = matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| "output".to_string());
    let step = matches.get_one::<f64>("step").copied();

    match execute_scenario(scenario, &output_dir, step, verbose_level) {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("エラー: {}", e);
            1
        }
    }
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    output_dir: &str,
    step: Option<f64>,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    if verbose_level > 0 {
        scenario.print_summary();
        println!();
    }

    let mut engine = SimulationEngine::new(scenario, verbose_level);
    if let Some(step) = step {
        if !step.is_finite() || step <= 0.0 {
            return Err(format!("サンプリング刻みは正の値で指定してください: {}", step).into());
        }
        engine = engine.with_time_step(step);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
    let outcomes = runtime.block_on(engine.run());

    let mut exporter = CsvTrackExporter::new(output_dir);
    let report = engine.export(&outcomes, &mut exporter);
    write_report(output_dir, &report)?;

    let failed = report.failed_count();
    info!(
        "完了: シミュレーション {}件 (成功 {}, 失敗 {}), 出力先 {}",
        report.simulations.len(),
        report.simulations.len() - failed,
        failed,
        output_dir
    );
    println!(
        "シミュレーション {}件を実行しました（失敗 {}件）。出力先: {}",
        report.simulations.len(),
        failed,
        output_dir
    );

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  interceptsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>  シナリオファイルを指定して実行");
    println!("      --demo             組み込みデモシナリオを実行");
    println!("  -i, --info             シナリオ情報のみ表示");
    println!("  -o, --output <DIR>     出力先ディレクトリ (既定: output)");
    println!("      --step <SECONDS>   サンプリング刻みを上書き");
    println!("  -v, --verbose          詳細出力 (複数指定で詳細レベル上昇)");
    println!("  -h, --help             このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/equator_demo.yaml   - 赤道上の基本デモ");
    println!("  scenarios/multi_group.yaml    - 複数グループ・失敗例を含むシナリオ");
    println!();
    println!("例:");
    println!("  interceptsim -s scenarios/equator_demo.yaml");
    println!("  interceptsim -s scenarios/multi_group.yaml -v -o out");
    println!("  interceptsim --demo --step 5");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scenario_is_valid() {
        let scenario = ScenarioConfig::from_yaml_str(DEMO_SCENARIO).unwrap();
        let outcomes = SimulationEngine::new(scenario, 0).run_sequential();
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[test]
    fn test_multi_group_scenario_isolates_failures() {
        let scenario = ScenarioConfig::from_yaml_str(include_str!("../scenarios/multi_group.yaml")).unwrap();
        let outcomes = SimulationEngine::new(scenario, 0).run_sequential();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_ok());
        assert!(outcomes[2].result.is_err());

        let pacific = outcomes[0].result.as_ref().unwrap();
        let sm3 = pacific.interceptors.iter().find(|i| i.id() == "SM-3").unwrap();
        assert!(sm3.solution().is_none());
    }

    #[test]
    fn test_cli_parses_options() {
        let matches = build_cli()
            .try_get_matches_from(["interceptsim", "-s", "a.yaml", "--step", "2.5", "-vv", "-o", "out"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("scenario").map(String::as_str), Some("a.yaml"));
        assert_eq!(matches.get_one::<f64>("step").copied(), Some(2.5));
        assert_eq!(matches.get_count("verbose"), 2);
        assert_eq!(matches.get_one::<String>("output").map(String::as_str), Some("out"));
    }

    #[test]
    fn test_cli_demo_conflicts_with_scenario() {
        assert!(build_cli()
            .try_get_matches_from(["interceptsim", "--demo", "-s", "a.yaml"])
            .is_err());
    }
}
