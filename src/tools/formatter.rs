//! 输出格式化模块
//!
//! 日志块沿用采集分析日志的写法（`File: … | Number of peaks found`、`Peak i: X = …, Y = …`、
//! `Mean = …, Sigma = …`），另提供汇总表和JSON报告。

use crate::core::analyzer::{ChannelAnalysis, RunAnalysis};
use crate::core::config::AnalysisConfig;
use crate::core::gaussian_fit::GaussianFit;
use crate::core::histogram::FillStats;
use crate::core::peak_search::Peak;
use crate::core::resolution::{ResolutionReport, UnresolvedPeak};
use crate::error::SpectroResult;
use crate::tools::batch_state::BatchStatsSnapshot;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;
use unicode_width::UnicodeWidthStr;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");

const SEPARATOR: &str =
    "--------------------------------------------------------------------------------\n";

/// 按显示宽度右补空格（中文字符占两列）
pub fn pad_label(label: &str, width: usize) -> String {
    let padding = width.saturating_sub(label.width());
    format!("{label}{}", " ".repeat(padding))
}

fn push_field(output: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(output, "{}: {value}", pad_label(label, 28));
}

/// 创建日志头部
pub fn create_log_header(input: &Path, config: &AnalysisConfig, run_count: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "GammaMeter v{VERSION} / Gamma-ray spectroscopy peak analysis");
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let _ = writeln!(output, "log date: {now}\n");
    output.push_str(SEPARATOR);

    push_field(&mut output, "输入 / Input", input.display());
    push_field(&mut output, "运行数 / Runs", run_count);
    push_field(
        &mut output,
        "定义域 / Domain",
        format_args!(
            "[{}, {}) x {} bins, {} channels",
            config.domain.low, config.domain.high, config.domain.bin_count, config.channel_count
        ),
    );
    push_field(
        &mut output,
        "本底 / Background",
        format_args!(
            "SNIP K = {}, LLS = {}",
            config.background.iterations, config.background.lls_transform
        ),
    );
    push_field(
        &mut output,
        "寻峰 / Peak search",
        format_args!(
            "sigma = {}, threshold = {}",
            config.peak_search.sigma, config.peak_search.threshold
        ),
    );
    push_field(&mut output, "拟合窗口 / Fit spread", config.fit.spread);
    push_field(&mut output, "刻度 / Calibration", config.calibration.describe());

    output.push_str(SEPARATOR);
    output.push('\n');
    output
}

fn format_channel(output: &mut String, run_name: &str, channel: &ChannelAnalysis) {
    let _ = writeln!(
        output,
        "File: {run_name} | Channel {} | Number of peaks found: {}",
        channel.channel_id,
        channel.peaks.len()
    );

    for peak in &channel.peaks {
        let _ = writeln!(
            output,
            "File: {run_name} | Peak {}: X = {:.2}, Y = {:.2}",
            peak.rank, peak.position_x, peak.position_y
        );
    }

    for fit in &channel.fits {
        let report = channel.reports.iter().find(|r| r.peak_rank == fit.peak_rank);
        match (fit.parameters(), report) {
            (Some(parameters), Some(report)) => {
                let _ = writeln!(
                    output,
                    "File: {run_name} | Peak {}: Mean = {:.3}, Sigma = {:.3} / Energy resolution: {:.4} % at {} keV (FWHM {:.3} keV)",
                    fit.peak_rank,
                    parameters.mean,
                    parameters.sigma,
                    report.resolution_percent,
                    report.calibration_energy_kev,
                    report.fwhm_kev
                );
            }
            (Some(parameters), None) => {
                let _ = writeln!(
                    output,
                    "File: {run_name} | Peak {}: Mean = {:.3}, Sigma = {:.3} / unresolved",
                    fit.peak_rank, parameters.mean, parameters.sigma
                );
            }
            (None, _) => {
                let reason = fit
                    .failure()
                    .map(|failure| failure.to_string())
                    .unwrap_or_default();
                let _ = writeln!(
                    output,
                    "File: {run_name} | Peak {}: fit failed / {reason}",
                    fit.peak_rank
                );
            }
        }
    }

    for unresolved in &channel.unresolved {
        let _ = writeln!(
            output,
            "File: {run_name} | Peak {}: unresolved ({})",
            unresolved.peak_rank,
            unresolved.reason.describe()
        );
    }
}

/// 单次运行的日志块（作为一个整体提交给写入端）
pub fn format_run_block(run: &RunAnalysis) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Processing file: {}", run.run_name);
    let _ = writeln!(
        output,
        "File: {} | Events: {} (routed {}, ignored channel {}, out of domain {})",
        run.run_name,
        run.stats.total_events,
        run.stats.routed_events,
        run.stats.ignored_channel,
        run.stats.out_of_domain
    );
    for channel in &run.channels {
        format_channel(&mut output, &run.run_name, channel);
    }
    output.push('\n');
    output
}

/// 失败运行的日志块
pub fn format_failed_run(run_name: &str, error: &dyn std::fmt::Display) -> String {
    format!("Processing file: {run_name}\nFile: {run_name} | [FAIL] {error}\n\n")
}

/// 分辨率汇总表
pub fn create_summary_table(runs: &[&RunAnalysis]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Run / 运行",
        "Ch",
        "Peak",
        "Mean",
        "Sigma",
        "E (keV)",
        "Resolution (%)",
        "FWHM (keV)",
    ]);

    let number = |value: f64, precision: usize| {
        Cell::new(format!("{value:.precision$}")).set_alignment(CellAlignment::Right)
    };

    for run in runs {
        for channel in &run.channels {
            for report in &channel.reports {
                table.add_row(vec![
                    Cell::new(&run.run_name),
                    Cell::new(channel.channel_id).set_alignment(CellAlignment::Right),
                    Cell::new(report.peak_rank).set_alignment(CellAlignment::Right),
                    number(report.mean, 3),
                    number(report.sigma, 3),
                    number(report.calibration_energy_kev, 3),
                    number(report.resolution_percent, 4),
                    number(report.fwhm_kev, 3),
                ]);
            }
        }
    }

    table.to_string()
}

/// 批量处理统计尾部
pub fn create_batch_footer(total_runs: usize, snapshot: &BatchStatsSnapshot) -> String {
    let mut output = String::new();
    output.push_str(SEPARATOR);
    let _ = writeln!(output, "批量处理统计 / Batch statistics:");
    push_field(&mut output, "   总运行数 / Total", total_runs);
    push_field(&mut output, "   成功处理 / Processed", snapshot.processed);
    push_field(&mut output, "   处理失败 / Failed", snapshot.failed);
    push_field(&mut output, "   分辨率报告 / Reports", snapshot.reports);
    push_field(
        &mut output,
        "   成功率 / Success rate",
        format_args!("{:.1}%", snapshot.success_rate()),
    );

    for (category, runs) in &snapshot.error_stats {
        let _ = writeln!(
            output,
            "   [{}] {}: {}",
            category.display_name(),
            runs.len(),
            runs.join(", ")
        );
    }

    let _ = writeln!(output, "\n生成工具 / Generated by: GammaMeter v{VERSION}");
    output
}

/// JSON报告中的通道视图（不含逐bin数组）
#[derive(Debug, Serialize)]
struct ChannelJson<'a> {
    channel_id: usize,
    total_counts: u64,
    underflow: u64,
    overflow: u64,
    subtracted_integral: f64,
    peaks: &'a [Peak],
    fits: &'a [GaussianFit],
    reports: &'a [ResolutionReport],
    unresolved: &'a [UnresolvedPeak],
}

#[derive(Debug, Serialize)]
struct RunJson<'a> {
    run_name: &'a str,
    stats: FillStats,
    channels: Vec<ChannelJson<'a>>,
}

impl<'a> From<&'a RunAnalysis> for RunJson<'a> {
    fn from(run: &'a RunAnalysis) -> Self {
        Self {
            run_name: &run.run_name,
            stats: run.stats,
            channels: run
                .channels
                .iter()
                .map(|channel| ChannelJson {
                    channel_id: channel.channel_id,
                    total_counts: channel.histogram.total(),
                    underflow: channel.histogram.underflow(),
                    overflow: channel.histogram.overflow(),
                    subtracted_integral: channel.subtracted.integral(),
                    peaks: &channel.peaks,
                    fits: &channel.fits,
                    reports: &channel.reports,
                    unresolved: &channel.unresolved,
                })
                .collect(),
        }
    }
}

/// 单次运行的JSON报告
pub fn format_run_json(run: &RunAnalysis) -> SpectroResult<String> {
    Ok(serde_json::to_string_pretty(&RunJson::from(run))?)
}

/// 多次运行的JSON报告（数组）
pub fn format_runs_json(runs: &[&RunAnalysis]) -> SpectroResult<String> {
    let views: Vec<RunJson<'_>> = runs.iter().map(|run| RunJson::from(*run)).collect();
    Ok(serde_json::to_string_pretty(&views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyzer::analyze_events;
    use crate::core::resolution::CalibrationPolicy;
    use crate::events::SyntheticRun;

    fn co60_run() -> RunAnalysis {
        let config = AnalysisConfig::new(CalibrationPolicy::co60_by_rank());
        let events = SyntheticRun::co60_like(0).generate().unwrap();
        analyze_events("run_001.jsonl", &events, &config).unwrap()
    }

    #[test]
    fn test_pad_label_uses_display_width() {
        assert_eq!(pad_label("ab", 4), "ab  ");
        assert_eq!(pad_label("能谱", 6), "能谱  ");
        assert_eq!(pad_label("too long", 3), "too long");
    }

    #[test]
    fn test_run_block_uses_log_vocabulary() {
        let block = format_run_block(&co60_run());

        assert!(block.starts_with("Processing file: run_001.jsonl"));
        assert!(block.contains("File: run_001.jsonl | Channel 0 | Number of peaks found: 2"));
        assert!(block.contains("Peak 1: X = "));
        assert!(block.contains("Mean = "));
        assert!(block.contains("Energy resolution"));
        assert!(block.contains("Channel 1 | Number of peaks found: 0"));
    }

    #[test]
    fn test_summary_table_lists_reports() {
        let run = co60_run();
        let table = create_summary_table(&[&run]);

        assert!(table.contains("run_001.jsonl"));
        assert!(table.contains("1173.228"));
        assert!(table.contains("1332.492"));
    }

    #[test]
    fn test_json_report_omits_bin_arrays() {
        let json = format_run_json(&co60_run()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["run_name"], "run_001.jsonl");
        assert_eq!(value["channels"][0]["reports"].as_array().unwrap().len(), 2);
        assert!(value["channels"][0].get("background").is_none());
        assert_eq!(value["channels"][0]["fits"][0]["outcome"]["status"], "converged");
    }

    #[test]
    fn test_footer_lists_failures_by_category() {
        let mut snapshot = BatchStatsSnapshot {
            processed: 1,
            failed: 1,
            reports: 2,
            ..BatchStatsSnapshot::default()
        };
        snapshot
            .error_stats
            .insert(crate::error::ErrorCategory::Format, vec!["bad.jsonl".to_string()]);

        let footer = create_batch_footer(2, &snapshot);
        assert!(footer.contains("bad.jsonl"));
        assert!(footer.contains("50.0%"));
    }
}
