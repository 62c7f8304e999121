//! 确定性合成运行
//!
//! 用分位数采样代替随机数：第k个事件取分布的 (k+0.5)/N 分位点，
//! 同样的参数总是生成同样的事件序列。

use super::record::EventRecord;
use crate::error::{SpectroResult, config_error};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Exp, Normal};

/// 高斯事件簇
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianCluster {
    pub mean: f64,
    pub sigma: f64,
    pub count: usize,
}

impl GaussianCluster {
    pub fn new(mean: f64, sigma: f64, count: usize) -> Self {
        Self { mean, sigma, count }
    }
}

#[inline]
fn quantile(k: usize, n: usize) -> f64 {
    (k as f64 + 0.5) / n as f64
}

#[inline]
fn to_charge(value: f64) -> u32 {
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

/// 生成单个高斯簇的电荷值
pub fn gaussian_charges(cluster: &GaussianCluster) -> SpectroResult<Vec<u32>> {
    let normal = Normal::new(cluster.mean, cluster.sigma)
        .map_err(|e| config_error(format!("高斯簇参数无效 / invalid cluster: {e}")))?;
    Ok((0..cluster.count)
        .map(|k| to_charge(normal.inverse_cdf(quantile(k, cluster.count))))
        .collect())
}

/// 生成指数分布连续本底的电荷值
pub fn exponential_charges(count: usize, mean: f64) -> SpectroResult<Vec<u32>> {
    if !(mean.is_finite() && mean > 0.0) {
        return Err(config_error(format!(
            "连续本底均值必须为正 / continuum mean must be positive, got {mean}"
        )));
    }
    let exp = Exp::new(1.0 / mean)
        .map_err(|e| config_error(format!("连续本底参数无效 / invalid continuum: {e}")))?;
    Ok((0..count)
        .map(|k| to_charge(exp.inverse_cdf(quantile(k, count))))
        .collect())
}

/// 合成运行描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRun {
    /// 事件所在通道
    pub channel_id: i32,
    /// 光电峰簇
    pub clusters: Vec<GaussianCluster>,
    /// 连续本底事件数
    pub continuum_events: usize,
    /// 连续本底的指数分布均值
    pub continuum_mean: f64,
}

impl SyntheticRun {
    /// 类Co-60运行：900/σ15 与 1050/σ18 各5000个事件，无连续本底
    pub fn co60_like(channel_id: i32) -> Self {
        Self {
            channel_id,
            clusters: vec![
                GaussianCluster::new(900.0, 15.0, 5000),
                GaussianCluster::new(1050.0, 18.0, 5000),
            ],
            continuum_events: 0,
            continuum_mean: 300.0,
        }
    }

    /// 生成事件（簇依次排列，连续本底在最后，时间戳按序递增）
    pub fn generate(&self) -> SpectroResult<Vec<EventRecord>> {
        let mut charges = Vec::new();
        for cluster in &self.clusters {
            charges.extend(gaussian_charges(cluster)?);
        }
        if self.continuum_events > 0 {
            charges.extend(exponential_charges(self.continuum_events, self.continuum_mean)?);
        }

        Ok(charges
            .into_iter()
            .enumerate()
            .map(|(index, charge)| EventRecord {
                channel_id: self.channel_id,
                charge_long: charge,
                fine_timestamp: index as f64 * 1000.0,
                ..EventRecord::default()
            })
            .collect())
    }
}
