//! SNIP本底估计
//!
//! 迭代局部削峰算法（Statistics-sensitive Non-linear Iterative Peak-clipping）：
//! 对第 p 次迭代使用窗口半宽 w = p，把每个bin压到其 ±w 两点平均值以下。
//! 算法不依赖峰形/峰宽假设，对重叠峰和任意形状的峰都适用。
//!
//! ## LLS 变换
//!
//! 削峰前先做 `v = ln(ln(√(y+1)+1)+1)` 压缩，抑制高峰对本底的主导；
//! 削峰结束后用逆变换还原到线性计数尺度。

use crate::core::config::BackgroundConfig;
use crate::core::histogram::Histogram;
use serde::Serialize;

/// 本底曲线（与直方图等长的浮点序列）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundCurve {
    /// 所属通道
    pub channel_id: usize,
    /// 各bin的本底估计
    pub values: Vec<f64>,
}

/// 扣除本底后的谱
///
/// 负值已夹紧为0，保证寻峰和显示使用的是非负的类计数谱。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtractedSpectrum {
    /// 所属通道
    pub channel_id: usize,
    /// 各bin的净计数
    pub values: Vec<f64>,
}

impl SubtractedSpectrum {
    /// 净计数总和
    pub fn integral(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// LLS压缩变换
#[inline]
fn lls_forward(y: f64) -> f64 {
    ((y.max(0.0) + 1.0).sqrt() + 1.0).ln().ln_1p()
}

/// LLS逆变换
#[inline]
fn lls_inverse(v: f64) -> f64 {
    let inner = v.exp_m1().exp() - 1.0;
    (inner * inner - 1.0).max(0.0)
}

/// SNIP本底估计器
#[derive(Debug, Clone, Copy)]
pub struct BackgroundEstimator {
    config: BackgroundConfig,
}

impl BackgroundEstimator {
    /// 创建估计器
    pub fn new(config: BackgroundConfig) -> Self {
        Self { config }
    }

    /// 对原始计数序列执行削峰，返回同长度的本底
    pub fn estimate_values(&self, y: &[f64]) -> Vec<f64> {
        let len = y.len();
        if y.iter().all(|&v| v == 0.0) {
            return vec![0.0; len];
        }

        let mut b: Vec<f64> = if self.config.lls_transform {
            y.iter().map(|&v| lls_forward(v)).collect()
        } else {
            y.to_vec()
        };
        let mut next = b.clone();

        for w in 1..=self.config.iterations {
            // 窗口超过谱长度一半后不再有可更新的bin
            if 2 * w >= len {
                break;
            }
            for i in w..len - w {
                let average = 0.5 * (b[i - w] + b[i + w]);
                next[i] = b[i].min(average);
            }
            // 边界bin在next中保持上一轮的值
            b.copy_from_slice(&next);
        }

        if self.config.lls_transform {
            b.iter_mut().for_each(|v| *v = lls_inverse(*v));
        }
        b
    }

    /// 估计直方图本底
    pub fn estimate(&self, histogram: &Histogram) -> BackgroundCurve {
        BackgroundCurve {
            channel_id: histogram.channel_id,
            values: self.estimate_values(&histogram.counts_f64()),
        }
    }

    /// 估计本底并返回扣除后的谱
    pub fn subtract(&self, histogram: &Histogram) -> (BackgroundCurve, SubtractedSpectrum) {
        let background = self.estimate(histogram);
        let values = histogram
            .counts()
            .iter()
            .zip(&background.values)
            .map(|(&raw, &bg)| (raw as f64 - bg).max(0.0))
            .collect();

        tracing::debug!(
            channel = histogram.channel_id,
            iterations = self.config.iterations,
            "本底扣除完成"
        );

        let subtracted = SubtractedSpectrum {
            channel_id: histogram.channel_id,
            values,
        };
        (background, subtracted)
    }
}

impl Default for BackgroundEstimator {
    fn default() -> Self {
        Self::new(BackgroundConfig::default())
    }
}
