//! 寻峰模块
//!
//! 在扣除本底后的谱上寻找显著的局部极大值：
//!
//! 1. 用宽度为 `sigma` 的归一化高斯核平滑（支撑 ±3σ，边缘处截断核重新归一化）
//! 2. 取平滑曲线的局部极大值作为候选
//! 3. 按平滑高度从高到低保留候选，距已保留峰不足 `sigma` 个bin的被抑制
//! 4. 只保留平滑高度 ≥ `threshold` × 最高峰 的候选
//! 5. 用三点抛物线插值细化峰位（偏移量夹紧在 ±0.5 bin）

use crate::core::background::SubtractedSpectrum;
use crate::core::config::{HistogramDomain, PeakOrder, PeakSearchConfig};
use crate::tools::constants::peak_search::KERNEL_TRUNCATE;
use serde::Serialize;

/// 检测到的峰
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// 排名（从1开始，按配置的位置顺序）
    pub rank: usize,

    /// 峰位（定义域单位，bin中心经抛物线细化）
    pub position_x: f64,

    /// 峰顶bin处的净计数
    pub position_y: f64,

    /// 峰顶处的平滑高度（阈值判定使用）
    pub smoothed_height: f64,

    /// 峰顶bin索引
    pub bin: usize,
}

/// 高斯平滑
///
/// 边缘处只累加落在谱内的核权重并重新归一化，避免边缘被压低。
pub fn smooth_gaussian(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.is_empty() || sigma <= 0.0 {
        return values.to_vec();
    }

    // 超出谱长的核权重不会被使用
    let max_radius = (values.len() - 1) as f64;
    let radius = (KERNEL_TRUNCATE * sigma).ceil().min(max_radius) as isize;
    let two_sigma2 = 2.0 * sigma * sigma;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|dx| {
            let x = dx as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();

    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let mut acc = 0.0;
            let mut norm = 0.0;
            for (k, &wk) in kernel.iter().enumerate() {
                let j = i + k as isize - radius;
                if (0..n).contains(&j) {
                    acc += wk * values[j as usize];
                    norm += wk;
                }
            }
            if norm > 0.0 { acc / norm } else { 0.0 }
        })
        .collect()
}

/// 三点抛物线顶点相对中间点的偏移
#[inline]
fn parabolic_offset(y0: f64, y1: f64, y2: f64) -> f64 {
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < 1e-12 {
        0.0
    } else {
        (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5)
    }
}

/// 寻峰器
#[derive(Debug, Clone, Copy)]
pub struct PeakDetector {
    config: PeakSearchConfig,
}

impl PeakDetector {
    /// 创建寻峰器
    pub fn new(config: PeakSearchConfig) -> Self {
        Self { config }
    }

    /// 在扣除本底后的谱上寻峰
    ///
    /// 没有满足条件的峰时返回空序列（不是错误）。
    pub fn search(&self, spectrum: &SubtractedSpectrum, domain: &HistogramDomain) -> Vec<Peak> {
        let values = &spectrum.values;
        let n = values.len();
        if n < 3 {
            return Vec::new();
        }

        let smoothed = smooth_gaussian(values, self.config.sigma);

        // 严格大于左邻、不小于右邻：平台只取最左一点
        let mut candidates: Vec<usize> = (1..n - 1)
            .filter(|&i| {
                let yi = smoothed[i];
                yi > 0.0 && yi > smoothed[i - 1] && yi >= smoothed[i + 1]
            })
            .collect();

        candidates.sort_by(|&a, &b| smoothed[b].total_cmp(&smoothed[a]).then(a.cmp(&b)));

        let mut kept: Vec<usize> = Vec::new();
        for index in candidates {
            let too_close = kept
                .iter()
                .any(|&other| (index.abs_diff(other) as f64) < self.config.sigma);
            if !too_close {
                kept.push(index);
            }
        }

        // kept 按高度降序，首元素即最高峰
        let Some(&tallest) = kept.first() else {
            return Vec::new();
        };
        let cut = self.config.threshold * smoothed[tallest];
        kept.retain(|&i| smoothed[i] >= cut);

        kept.sort_unstable();
        if self.config.order == PeakOrder::Descending {
            kept.reverse();
        }

        let width = domain.bin_width();
        let peaks: Vec<Peak> = kept
            .into_iter()
            .enumerate()
            .map(|(position, i)| {
                let offset = parabolic_offset(smoothed[i - 1], smoothed[i], smoothed[i + 1]);
                Peak {
                    rank: position + 1,
                    position_x: domain.bin_center(i) + offset * width,
                    position_y: values[i],
                    smoothed_height: smoothed[i],
                    bin: i,
                }
            })
            .collect();

        tracing::debug!(
            channel = spectrum.channel_id,
            peaks = peaks.len(),
            "寻峰完成"
        );

        peaks
    }
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new(PeakSearchConfig::default())
    }
}
