//! 核心算法模块
//!
//! 直方图、本底估计、寻峰、高斯拟合和分辨率计算，以及串联它们的单次运行分析。

pub mod analyzer;
pub mod background;
pub mod config;
pub mod gaussian_fit;
pub mod histogram;
pub mod peak_search;
pub mod resolution;

// 重新导出公共接口
pub use analyzer::{ChannelAnalysis, RunAnalysis, analyze_events, analyze_source};
pub use background::{BackgroundCurve, BackgroundEstimator, SubtractedSpectrum};
pub use config::{
    AnalysisConfig, BackgroundConfig, FitConfig, HistogramDomain, PeakOrder, PeakSearchConfig,
};
pub use gaussian_fit::{FitFailure, FitOutcome, GaussianFit, GaussianParameters, PeakFitter};
pub use histogram::{FillStats, Histogram, HistogramBuilder};
pub use peak_search::{Peak, PeakDetector};
pub use resolution::{
    CalibrationPolicy, ResolutionCalculator, ResolutionReport, UnresolvedPeak, UnresolvedReason,
};
