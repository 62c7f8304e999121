//! 工具层集成测试
//!
//! 测试CLI、运行文件扫描、批处理和日志写入等工具模块的集成功能。


use gammameter::core::{AnalysisConfig, CalibrationPolicy, PeakOrder};
use gammameter::error::{ErrorCategory, SpectroError};
use gammameter::events::{EventRecord, SyntheticRun};
use gammameter::tools::{
    self, AppConfig, LogFileSink, MemorySink, ReportSink, constants::defaults,
};
use run_test_fixtures::{co60_pair_events, log, scratch_dir, write_run};
use std::path::PathBuf;

fn base_config(input: PathBuf) -> AppConfig {
    AppConfig {
        input_path: input,
        verbose: false,
        output_path: None,
        json: false,
        parallel_files: Some(defaults::PARALLEL_FILES_DEGREE),
        max_runs: defaults::MAX_RUNS,
        recursive: false,
        analysis: AnalysisConfig::new(CalibrationPolicy::co60_by_rank()),
    }
}

// ============================================================================
// CLI配置测试
// ============================================================================

/// 验证批量模式检测（目录路径）
#[test]
fn test_batch_mode_detection_directory() {
    let dir = scratch_dir("mode_dir");
    assert!(base_config(dir.clone()).is_batch_mode(), "目录路径应该被识别为批量模式");

    let file = write_run(&dir, "run.jsonl", &[EventRecord::new(0, 10)]);
    assert!(!base_config(file).is_batch_mode(), "文件路径应该被识别为单运行模式");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_requires_calibration_policy() {
    let err = tools::parse_args_from(["gammameter", "run.jsonl"]).unwrap_err();

    assert!(matches!(err, SpectroError::InvalidConfiguration(_)));
    assert!(err.to_string().contains("calibration"));
}

#[test]
fn test_cli_defaults_with_co60() {
    let config = tools::parse_args_from(["gammameter", "run.jsonl", "--co60"]).unwrap();

    assert_eq!(config.input_path, PathBuf::from("run.jsonl"));
    assert_eq!(config.parallel_files, Some(defaults::PARALLEL_FILES_DEGREE));
    assert_eq!(config.max_runs, defaults::MAX_RUNS);
    assert_eq!(config.analysis, AnalysisConfig::new(CalibrationPolicy::co60_by_rank()));
}

#[test]
fn test_cli_overrides_analysis_parameters() {
    let config = tools::parse_args_from([
        "gammameter",
        "runs",
        "--rank-energies",
        "661.657",
        "--bins",
        "1000",
        "--high",
        "4000",
        "--sigma",
        "12",
        "--threshold",
        "0.2",
        "--order",
        "desc",
        "--spread",
        "40",
        "--no-lls",
        "--serial",
        "--max-runs",
        "3",
    ])
    .unwrap();

    let analysis = &config.analysis;
    assert_eq!(analysis.domain.bin_count, 1000);
    assert_eq!(analysis.domain.high, 4000.0);
    assert_eq!(analysis.peak_search.sigma, 12.0);
    assert_eq!(analysis.peak_search.threshold, 0.2);
    assert_eq!(analysis.peak_search.order, PeakOrder::Descending);
    assert_eq!(analysis.fit.spread, 40.0);
    assert!(!analysis.background.lls_transform);
    assert_eq!(
        analysis.calibration,
        CalibrationPolicy::ByRank {
            energies_kev: vec![661.657]
        }
    );
    assert_eq!(config.parallel_files, None, "--serial 关闭并行");
    assert_eq!(config.max_runs, 3);
}

#[test]
fn test_cli_rejects_invalid_values_before_any_run() {
    let cases: [&[&str]; 3] = [
        &["gammameter", "x", "--co60", "--bins", "0"],
        &["gammameter", "x", "--co60", "--low", "10", "--high", "5"],
        &["gammameter", "x", "--co60", "--threshold", "1.5"],
    ];

    for args in cases {
        let err = tools::parse_args_from(args.iter().copied()).unwrap_err();
        assert_eq!(
            ErrorCategory::from_error(&err),
            ErrorCategory::Configuration,
            "{args:?}"
        );
        log(format!("  ✓ 拒绝: {args:?}"), "rejected");
    }
}

#[test]
fn test_cli_reads_json_config_file() {
    let dir = scratch_dir("cli_config");
    let path = dir.join("analysis.json");

    let mut analysis = AnalysisConfig::new(CalibrationPolicy::co60_nearest(1.27, 0.0, 40.0));
    analysis.fit.spread = 45.0;
    std::fs::write(&path, serde_json::to_string_pretty(&analysis).unwrap()).unwrap();

    let config =
        tools::parse_args_from(["gammameter", "x", "--config", path.to_str().unwrap()]).unwrap();
    assert_eq!(config.analysis, analysis);

    // 命令行刻度策略覆盖配置文件
    let config = tools::parse_args_from([
        "gammameter",
        "x",
        "--config",
        path.to_str().unwrap(),
        "--co60",
    ])
    .unwrap();
    assert_eq!(config.analysis.calibration, CalibrationPolicy::co60_by_rank());
    assert_eq!(config.analysis.fit.spread, 45.0);

    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================================
// 扫描测试
// ============================================================================

#[test]
fn test_scan_filters_sorts_and_limits() {
    let dir = scratch_dir("scan_limits");
    for name in ["c.jsonl", "a.jsonl", "b.JSON", "notes.txt", "gammameter_old.log"] {
        std::fs::write(dir.join(name), "").unwrap();
    }
    std::fs::create_dir_all(dir.join("nested")).unwrap();
    std::fs::write(dir.join("nested").join("d.jsonl"), "").unwrap();

    let flat = tools::scan_run_files(&dir, false, 50).unwrap();
    let names: Vec<String> = flat
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.jsonl", "b.JSON", "c.jsonl"]);

    assert_eq!(tools::scan_run_files(&dir, true, 50).unwrap().len(), 4);
    assert_eq!(tools::scan_run_files(&dir, true, 2).unwrap().len(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_scan_missing_directory_is_input_error() {
    let err = tools::scan_run_files(&PathBuf::from("/nonexistent/runs"), false, 50).unwrap_err();
    assert_eq!(ErrorCategory::from_error(&err), ErrorCategory::Input);
}

// ============================================================================
// 批处理测试
// ============================================================================

#[test]
fn test_batch_continues_past_failed_runs() {
    let dir = scratch_dir("batch_failures");
    write_run(&dir, "a_good.jsonl", &co60_pair_events());
    std::fs::write(dir.join("b_broken.jsonl"), "{not json}\n").unwrap();
    write_run(&dir, "c_good.jsonl", &SyntheticRun::co60_like(1).generate().unwrap());

    let files = tools::scan_run_files(&dir, false, 50).unwrap();
    let config = base_config(dir.clone());
    let sink = MemorySink::new();

    let outcome = tools::process_batch_serial(&files, &config, &sink).unwrap();

    assert_eq!(outcome.snapshot.processed, 2);
    assert_eq!(outcome.snapshot.failed, 1);
    assert_eq!(outcome.snapshot.reports, 4);
    assert_eq!(
        outcome.snapshot.error_stats.get(&ErrorCategory::Format),
        Some(&vec!["b_broken.jsonl".to_string()])
    );
    assert_eq!(sink.blocks().len(), 3);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_parallel_batch_writes_complete_log() {
    let dir = scratch_dir("batch_log");
    for i in 0..6 {
        write_run(&dir, &format!("run_{i}.jsonl"), &co60_pair_events());
    }
    let files = tools::scan_run_files(&dir, false, 50).unwrap();
    let config = base_config(dir.clone());
    let log_path = dir.join("batch.log");

    let sink = LogFileSink::create(&log_path).unwrap();
    sink.submit(tools::create_log_header(&dir, &config.analysis, files.len()))
        .unwrap();
    let outcome = tools::process_batch_parallel(&files, &config, 3, &sink).unwrap();
    let runs: Vec<_> = outcome.runs.iter().collect();
    sink.submit(tools::create_summary_table(&runs)).unwrap();
    sink.submit(tools::create_batch_footer(files.len(), &outcome.snapshot))
        .unwrap();
    assert_eq!(sink.finish().unwrap(), 9);

    let text = std::fs::read_to_string(&log_path).unwrap();
    for i in 0..6 {
        let marker = format!("Processing file: run_{i}.jsonl");
        assert_eq!(text.matches(&marker).count(), 1, "{marker}");
    }
    assert_eq!(text.matches("Energy resolution").count(), 12);
    assert!(text.contains("Batch statistics"));

    let json = tools::format_runs_json(&runs).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().map(Vec::len), Some(6));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_batch_output_path_defaults_to_input_directory() {
    let dir = scratch_dir("batch_path");
    let config = base_config(dir.clone());

    let path = tools::generate_batch_output_path(&config);
    assert_eq!(path.parent(), Some(dir.as_path()));
    assert!(path.extension().is_some_and(|e| e == "log"));

    let explicit = AppConfig {
        output_path: Some(dir.join("custom.log")),
        ..base_config(dir.clone())
    };
    assert_eq!(tools::generate_batch_output_path(&explicit), dir.join("custom.log"));

    let _ = std::fs::remove_dir_all(&dir);
}
