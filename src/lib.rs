//! GammaMeter - 伽马能谱峰分析工具
//!
//! 把探测器事件记录累加为各通道的能谱直方图，扣除连续本底，寻找光电峰，
//! 对每个峰做高斯拟合并给出能量分辨率（如Co-60两条γ线的刻度验证）。
//!
//! ## 核心流程
//! - 固定定义域直方图（参考配置 2000 bins 覆盖 [0, 2000)）
//! - SNIP迭代削峰本底估计（可选LLS变换）
//! - 高斯平滑寻峰 + 最小峰间距抑制 + 相对阈值
//! - Levenberg–Marquardt高斯拟合
//! - 分辨率 = 2.3548·σ/μ·100 %

pub mod core;
pub mod error;
pub mod events;
pub mod tools;

// 重新导出核心类型
pub use crate::core::{
    AnalysisConfig, CalibrationPolicy, GaussianFit, Histogram, Peak, ResolutionReport,
    RunAnalysis, analyze_events,
};
pub use crate::error::{ErrorCategory, SpectroError, SpectroResult};
pub use crate::events::{EventFile, EventRecord, EventSource};
