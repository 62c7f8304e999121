//! 运行文件处理模块
//!
//! 单个运行文件的读取、分析与结果输出。

use super::batch_state::{BatchStatsSnapshot, SerialBatchStats};
use super::cli::AppConfig;
use super::report_sink::ReportSink;
use super::{formatter, utils};
use crate::core::analyzer::{RunAnalysis, analyze_source};
use crate::core::config::AnalysisConfig;
use crate::error::{ErrorCategory, SpectroResult};
use crate::events::EventFile;
use std::path::{Path, PathBuf};

/// 批处理结果：成功运行（按输入顺序）与统计快照
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub runs: Vec<RunAnalysis>,
    pub snapshot: BatchStatsSnapshot,
}

/// 读取并分析单个运行文件
pub fn process_single_run_file(path: &Path, config: &AnalysisConfig) -> SpectroResult<RunAnalysis> {
    let source = EventFile::new(path);
    analyze_source(&source, config)
}

/// 串行批量处理
///
/// 单个运行失败只计入统计，不影响后续运行。
pub fn process_batch_serial(
    run_files: &[PathBuf],
    config: &AppConfig,
    sink: &dyn ReportSink,
) -> SpectroResult<BatchOutcome> {
    let mut stats = SerialBatchStats::new();
    let mut runs = Vec::with_capacity(run_files.len());

    for (index, run_file) in run_files.iter().enumerate() {
        let run_name = utils::extract_filename_lossy(run_file);
        if config.verbose {
            println!(
                "[PROCESSING] [{}/{}] 处理 / Processing: {run_name}",
                index + 1,
                run_files.len()
            );
        }

        match process_single_run_file(run_file, &config.analysis) {
            Ok(run) => {
                stats.inc_processed(run.report_count());
                sink.submit(formatter::format_run_block(&run))?;
                if config.verbose {
                    println!("   [OK] {}", summarize_run(&run));
                }
                runs.push(run);
            }
            Err(e) => {
                let category = ErrorCategory::from_error(&e);
                tracing::warn!(run = %run_name, error = %e, "运行被跳过");
                println!(
                    "[FAIL] [{}/{}] {run_name} - [{}] {e} / 处理失败",
                    index + 1,
                    run_files.len(),
                    category.display_name()
                );
                sink.submit(formatter::format_failed_run(&run_name, &e))?;
                stats.inc_failed(category, run_name);
            }
        }
    }

    Ok(BatchOutcome {
        runs,
        snapshot: stats.snapshot(),
    })
}

/// 单运行模式输出
///
/// 文本或JSON写到标准输出；指定 `--output` 时同时写入文件（文本日志带头部）。
pub fn output_results(run: &RunAnalysis, config: &AppConfig) -> SpectroResult<()> {
    let body = if config.json {
        formatter::format_run_json(run)?
    } else {
        let mut text = formatter::format_run_block(run);
        if run.report_count() > 0 {
            text.push_str(&formatter::create_summary_table(&[run]));
            text.push('\n');
        }
        text
    };

    println!("{body}");

    if let Some(output_path) = &config.output_path {
        let content = if config.json {
            body
        } else {
            let mut content = formatter::create_log_header(&config.input_path, &config.analysis, 1);
            content.push_str(&body);
            content
        };
        std::fs::write(output_path, content)?;
        println!("结果已保存 / Saved to: {}", output_path.display());
    }

    Ok(())
}

/// 一次运行的简短控制台摘要
pub fn summarize_run(run: &RunAnalysis) -> String {
    let mut parts = Vec::new();
    for channel in &run.channels {
        for report in &channel.reports {
            parts.push(format!(
                "ch{} {:.1}→{:.3}%",
                channel.channel_id, report.mean, report.resolution_percent
            ));
        }
    }
    if parts.is_empty() {
        format!("{} peaks, no resolution reports", run.peak_count())
    } else {
        parts.join(", ")
    }
}
