//! 单次运行分析流水线
//!
//! 事件 → 直方图 → 本底扣除 → 寻峰 → 高斯拟合 → 分辨率，按通道顺序同步执行。
//! 每个阶段返回自有数据交给下一阶段，运行之间不共享任何状态。

use crate::core::background::{BackgroundCurve, BackgroundEstimator, SubtractedSpectrum};
use crate::core::config::AnalysisConfig;
use crate::core::gaussian_fit::{GaussianFit, PeakFitter};
use crate::core::histogram::{FillStats, Histogram, HistogramBuilder};
use crate::core::peak_search::{Peak, PeakDetector};
use crate::core::resolution::{ResolutionCalculator, ResolutionReport, UnresolvedPeak};
use crate::error::SpectroResult;
use crate::events::{EventRecord, EventSource};
use serde::Serialize;

/// 单通道分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAnalysis {
    pub channel_id: usize,
    pub histogram: Histogram,
    pub background: BackgroundCurve,
    pub subtracted: SubtractedSpectrum,
    pub peaks: Vec<Peak>,
    /// 与 `peaks` 一一对应
    pub fits: Vec<GaussianFit>,
    pub reports: Vec<ResolutionReport>,
    pub unresolved: Vec<UnresolvedPeak>,
}

/// 单次运行分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunAnalysis {
    pub run_name: String,
    pub stats: FillStats,
    pub channels: Vec<ChannelAnalysis>,
}

impl RunAnalysis {
    /// 所有通道的分辨率报告数
    pub fn report_count(&self) -> usize {
        self.channels.iter().map(|c| c.reports.len()).sum()
    }

    /// 所有通道检测到的峰数
    pub fn peak_count(&self) -> usize {
        self.channels.iter().map(|c| c.peaks.len()).sum()
    }

    /// 未解析的峰数
    pub fn unresolved_count(&self) -> usize {
        self.channels.iter().map(|c| c.unresolved.len()).sum()
    }
}

/// 分析一组事件
///
/// 配置在任何计算之前校验；此后空直方图、无峰、单峰拟合失败都不是错误。
pub fn analyze_events(
    run_name: &str,
    events: &[EventRecord],
    config: &AnalysisConfig,
) -> SpectroResult<RunAnalysis> {
    config.validate()?;

    let builder = HistogramBuilder::new(config.domain, config.channel_count);
    let (histograms, stats) = builder.build(events);

    let estimator = BackgroundEstimator::new(config.background);
    let detector = PeakDetector::new(config.peak_search);
    let fitter = PeakFitter::new(config.fit);
    let calculator = ResolutionCalculator::new(config.calibration.clone());

    let channels = histograms
        .into_iter()
        .map(|histogram| {
            let (background, subtracted) = estimator.subtract(&histogram);
            let peaks = detector.search(&subtracted, &histogram.domain);
            let fits: Vec<GaussianFit> = peaks
                .iter()
                .map(|peak| fitter.fit(&subtracted, &histogram.domain, peak))
                .collect();
            let (reports, unresolved) = calculator.calibrate(&fits);

            ChannelAnalysis {
                channel_id: histogram.channel_id,
                histogram,
                background,
                subtracted,
                peaks,
                fits,
                reports,
                unresolved,
            }
        })
        .collect();

    let analysis = RunAnalysis {
        run_name: run_name.to_string(),
        stats,
        channels,
    };

    tracing::info!(
        run = run_name,
        events = stats.total_events,
        peaks = analysis.peak_count(),
        reports = analysis.report_count(),
        "运行分析完成"
    );

    Ok(analysis)
}

/// 从事件来源读取并分析
pub fn analyze_source(
    source: &dyn EventSource,
    config: &AnalysisConfig,
) -> SpectroResult<RunAnalysis> {
    let events = source.read_events()?;
    analyze_events(source.name(), &events, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolution::CalibrationPolicy;
    use crate::events::{MemorySource, SyntheticRun};

    #[test]
    fn test_invalid_configuration_is_rejected_before_analysis() {
        let mut config = AnalysisConfig::new(CalibrationPolicy::co60_by_rank());
        config.fit.spread = -1.0;

        assert!(analyze_events("bad", &[], &config).is_err());
    }

    #[test]
    fn test_no_events_gives_trivial_outputs() {
        let config = AnalysisConfig::new(CalibrationPolicy::co60_by_rank());
        let analysis = analyze_events("empty", &[], &config).unwrap();

        assert_eq!(analysis.channels.len(), 4);
        assert_eq!(analysis.peak_count(), 0);
        assert_eq!(analysis.report_count(), 0);
        assert!(analysis.channels[0].background.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_co60_like_run_resolves_two_lines() {
        let config = AnalysisConfig::new(CalibrationPolicy::co60_by_rank());
        let source = MemorySource::new("co60", SyntheticRun::co60_like(0).generate().unwrap());

        let analysis = analyze_source(&source, &config).unwrap();

        let channel = &analysis.channels[0];
        assert_eq!(channel.peaks.len(), 2);
        assert_eq!(channel.reports.len(), 2);
        assert!((channel.reports[0].mean - 900.5).abs() < 2.0);
        assert!((channel.reports[1].mean - 1050.5).abs() < 2.0);
        assert!((channel.reports[0].calibration_energy_kev - 1173.228).abs() < 1e-9);
        assert_eq!(analysis.channels[1].reports.len(), 0);
        assert_eq!(analysis.run_name, "co60");
    }
}
