//! 分析参数配置
//!
//! 所有数值参数集中在显式配置结构中传入各阶段，默认值来自 `tools::constants`。
//! 配置在任何运行开始之前通过 `validate()` 校验，非法配置是唯一的致命错误。

use crate::core::resolution::CalibrationPolicy;
use crate::error::{SpectroResult, config_error};
use crate::tools::constants;
use serde::{Deserialize, Serialize};

/// 直方图定义域：[low, high) 等分为 bin_count 个bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramDomain {
    /// 下边界（含）
    pub low: f64,
    /// 上边界（不含）
    pub high: f64,
    /// bin数量
    pub bin_count: usize,
}

impl Default for HistogramDomain {
    fn default() -> Self {
        Self {
            low: constants::histogram::LOW_EDGE,
            high: constants::histogram::HIGH_EDGE,
            bin_count: constants::histogram::BIN_COUNT,
        }
    }
}

impl HistogramDomain {
    /// 创建定义域（不做校验，见 `validate`）
    pub fn new(low: f64, high: f64, bin_count: usize) -> Self {
        Self {
            low,
            high,
            bin_count,
        }
    }

    /// bin宽度
    #[inline]
    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.bin_count as f64
    }

    /// 第 `index` 个bin的中心坐标
    #[inline]
    pub fn bin_center(&self, index: usize) -> f64 {
        self.low + (index as f64 + 0.5) * self.bin_width()
    }

    /// 坐标所在的bin，定义域外返回None
    #[inline]
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.low || value >= self.high {
            return None;
        }
        let index = ((value - self.low) / self.bin_width()) as usize;
        Some(index.min(self.bin_count - 1))
    }

    /// 校验定义域
    pub fn validate(&self) -> SpectroResult<()> {
        if self.bin_count == 0 {
            return Err(config_error("bin数量必须为正 / bin count must be positive"));
        }
        if !self.low.is_finite() || !self.high.is_finite() || self.high <= self.low {
            return Err(config_error(format!(
                "定义域无效 / invalid histogram domain [{}, {})",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// SNIP本底估计参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// 削峰迭代次数K
    pub iterations: usize,
    /// 是否使用LLS压缩/还原变换
    pub lls_transform: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            iterations: constants::background::ITERATIONS,
            lls_transform: constants::background::LLS_TRANSFORM,
        }
    }
}

/// 峰的排名顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakOrder {
    /// 按位置升序（rank 1 为最低能量峰）
    #[default]
    Ascending,
    /// 按位置降序（rank 1 为最高能量峰）
    Descending,
}

/// 寻峰参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSearchConfig {
    /// 预期峰宽（bin）
    pub sigma: f64,
    /// 相对高度阈值 (0, 1]
    pub threshold: f64,
    /// 排名顺序
    pub order: PeakOrder,
}

impl Default for PeakSearchConfig {
    fn default() -> Self {
        Self {
            sigma: constants::peak_search::SIGMA,
            threshold: constants::peak_search::THRESHOLD,
            order: PeakOrder::default(),
        }
    }
}

/// 高斯拟合参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// 拟合窗口半宽（定义域单位）
    pub spread: f64,
    /// 窗口内最少非零bin数
    pub min_fit_points: usize,
    /// LM迭代上限
    pub max_iterations: usize,
    /// χ²相对变化收敛容差
    pub tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            spread: constants::fit::SPREAD,
            min_fit_points: constants::fit::MIN_FIT_POINTS,
            max_iterations: constants::fit::MAX_ITERATIONS,
            tolerance: constants::fit::TOLERANCE,
        }
    }
}

/// 完整分析配置
///
/// 刻度策略没有安全默认值，必须由调用方按放射源提供，因此不实现 `Default`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 直方图定义域
    #[serde(default)]
    pub domain: HistogramDomain,
    /// 通道数N
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,
    /// 本底估计参数
    #[serde(default)]
    pub background: BackgroundConfig,
    /// 寻峰参数
    #[serde(default)]
    pub peak_search: PeakSearchConfig,
    /// 拟合参数
    #[serde(default)]
    pub fit: FitConfig,
    /// 峰→物理谱线的能量对应策略
    pub calibration: CalibrationPolicy,
}

fn default_channel_count() -> usize {
    constants::histogram::CHANNEL_COUNT
}

impl AnalysisConfig {
    /// 使用默认数值参数和给定刻度策略创建配置
    pub fn new(calibration: CalibrationPolicy) -> Self {
        Self {
            domain: HistogramDomain::default(),
            channel_count: default_channel_count(),
            background: BackgroundConfig::default(),
            peak_search: PeakSearchConfig::default(),
            fit: FitConfig::default(),
            calibration,
        }
    }

    /// 从JSON配置文件读取
    pub fn from_json_file(path: &std::path::Path) -> SpectroResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// 校验全部参数
    pub fn validate(&self) -> SpectroResult<()> {
        self.domain.validate()?;

        if self.channel_count == 0 {
            return Err(config_error("通道数必须为正 / channel count must be positive"));
        }
        if self.background.iterations == 0 {
            return Err(config_error(
                "本底迭代次数必须为正 / background iterations must be positive",
            ));
        }
        if !(self.peak_search.sigma.is_finite() && self.peak_search.sigma > 0.0) {
            return Err(config_error(format!(
                "寻峰sigma必须为正 / peak search sigma must be positive, got {}",
                self.peak_search.sigma
            )));
        }
        if self.peak_search.sigma > self.domain.bin_count as f64 {
            return Err(config_error(format!(
                "寻峰sigma不能超过bin数 / peak search sigma must not exceed the bin count ({}), got {}",
                self.domain.bin_count, self.peak_search.sigma
            )));
        }
        if !(self.peak_search.threshold > 0.0 && self.peak_search.threshold <= 1.0) {
            return Err(config_error(format!(
                "寻峰阈值必须在 (0, 1] / threshold must be in (0, 1], got {}",
                self.peak_search.threshold
            )));
        }
        if !(self.fit.spread.is_finite() && self.fit.spread > 0.0) {
            return Err(config_error(format!(
                "拟合窗口必须为正 / fit spread must be positive, got {}",
                self.fit.spread
            )));
        }
        if self.fit.min_fit_points < 3 {
            return Err(config_error(
                "拟合至少需要3个点 / at least 3 fit points are required",
            ));
        }
        if self.fit.max_iterations == 0 {
            return Err(config_error(
                "拟合迭代上限必须为正 / fit iteration budget must be positive",
            ));
        }
        if !(self.fit.tolerance.is_finite() && self.fit.tolerance > 0.0) {
            return Err(config_error("拟合容差必须为正 / fit tolerance must be positive"));
        }

        self.calibration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn co60() -> AnalysisConfig {
        AnalysisConfig::new(CalibrationPolicy::co60_by_rank())
    }

    #[test]
    fn test_default_domain_matches_reference() {
        let domain = HistogramDomain::default();
        assert_eq!(domain.bin_count, 2000);
        assert!((domain.bin_width() - 1.0).abs() < 1e-12);
        assert!((domain.bin_center(900) - 900.5).abs() < 1e-12);
    }

    #[test]
    fn test_bin_index_edges() {
        let domain = HistogramDomain::default();
        assert_eq!(domain.bin_index(0.0), Some(0));
        assert_eq!(domain.bin_index(1999.999), Some(1999));
        assert_eq!(domain.bin_index(2000.0), None);
        assert_eq!(domain.bin_index(-0.1), None);
        assert_eq!(domain.bin_index(f64::NAN), None);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(co60().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let mut config = co60();
        config.domain.bin_count = 0;
        assert!(config.validate().is_err());

        let mut config = co60();
        config.fit.spread = 0.0;
        assert!(config.validate().is_err());

        let mut config = co60();
        config.peak_search.sigma = -1.0;
        assert!(config.validate().is_err());

        let mut config = co60();
        config.peak_search.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = co60();
        config.peak_search.sigma = 1e12;
        assert!(config.validate().is_err());

        let mut config = co60();
        config.domain = HistogramDomain::new(10.0, 10.0, 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_config_uses_defaults_for_missing_sections() {
        let json = r#"{
            "peak_search": { "threshold": 0.2 },
            "calibration": { "by_rank": { "energies_kev": [1173.2, 1332.5] } }
        }"#;

        let config: AnalysisConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.domain, HistogramDomain::default());
        assert_eq!(config.channel_count, 4);
        assert!((config.peak_search.threshold - 0.2).abs() < 1e-12);
        assert!((config.peak_search.sigma - 30.5).abs() < 1e-12);
        assert_eq!(config.background.iterations, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_config_requires_calibration() {
        let json = r#"{ "channel_count": 2 }"#;
        assert!(serde_json::from_str::<AnalysisConfig>(json).is_err());
    }
}
