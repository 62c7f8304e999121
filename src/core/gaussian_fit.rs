//! 高斯峰拟合
//!
//! 在峰位两侧 `spread` 的窗口内，用Levenberg–Marquardt最小化Neyman χ²：
//!
//! ```text
//! f(x) = A·exp(−(x−μ)² / (2σ²))
//! χ² = Σ (yᵢ − f(xᵢ))² / yᵢ        （只使用 yᵢ > 0 的bin）
//! ```
//!
//! 初值 A₀ = 峰高，μ₀ = 峰位，σ₀ = spread / 3。
//! 拟合失败以 `FitFailure` 值返回，不会中断所在运行的其他峰。

use crate::core::background::SubtractedSpectrum;
use crate::core::config::{FitConfig, HistogramDomain};
use crate::core::peak_search::Peak;
use crate::tools::constants::fit::{INITIAL_LAMBDA, MAX_LAMBDA, SIGMA_SEED_DIVISOR};
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// 收敛的拟合参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaussianParameters {
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
    pub amplitude_error: f64,
    pub mean_error: f64,
    pub sigma_error: f64,
    /// 最终χ²
    pub chi_square: f64,
    /// 自由度（拟合点数 − 3）
    pub ndf: usize,
    /// χ²概率，自由度为0时没有定义
    pub probability: Option<f64>,
    /// 实际使用的LM迭代次数
    pub iterations: usize,
}

/// 单峰拟合失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitFailure {
    /// 窗口内非零bin不足
    #[error("拟合点不足 / too few points: {found} < {required}")]
    TooFewPoints { found: usize, required: usize },

    /// 迭代预算耗尽
    #[error("未收敛 / did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },

    /// 奇异矩阵、非有限参数、σ ≤ 0 或均值落在窗口外
    #[error("拟合退化 / degenerate fit: {reason}")]
    Degenerate { reason: &'static str },
}

/// 拟合结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitOutcome {
    Converged(GaussianParameters),
    Failed(FitFailure),
}

/// 一个峰的拟合记录（每个峰恰好一条）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaussianFit {
    /// 对应峰的排名
    pub peak_rank: usize,
    /// 拟合窗口下边界
    pub fit_range_low: f64,
    /// 拟合窗口上边界
    pub fit_range_high: f64,
    /// 窗口内参与拟合的点数
    pub points: usize,
    pub outcome: FitOutcome,
}

impl GaussianFit {
    /// 是否收敛
    #[inline]
    pub fn converged(&self) -> bool {
        matches!(self.outcome, FitOutcome::Converged(_))
    }

    /// 收敛时的参数
    #[inline]
    pub fn parameters(&self) -> Option<&GaussianParameters> {
        match &self.outcome {
            FitOutcome::Converged(parameters) => Some(parameters),
            FitOutcome::Failed(_) => None,
        }
    }

    /// 失败原因
    #[inline]
    pub fn failure(&self) -> Option<FitFailure> {
        match self.outcome {
            FitOutcome::Converged(_) => None,
            FitOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// 单次LM求解的中间状态
struct NormalEquations {
    /// JᵀWJ
    alpha: Matrix3<f64>,
    /// JᵀW(y − f)
    beta: Vector3<f64>,
}

#[inline]
fn gaussian(x: f64, p: &Vector3<f64>) -> f64 {
    let dx = x - p[1];
    p[0] * (-dx * dx / (2.0 * p[2] * p[2])).exp()
}

fn chi_square(points: &[(f64, f64)], p: &Vector3<f64>) -> f64 {
    points
        .iter()
        .map(|&(x, y)| {
            let r = y - gaussian(x, p);
            r * r / y
        })
        .sum()
}

fn normal_equations(points: &[(f64, f64)], p: &Vector3<f64>) -> NormalEquations {
    let mut alpha = Matrix3::zeros();
    let mut beta = Vector3::zeros();
    let (mean, sigma) = (p[1], p[2]);

    for &(x, y) in points {
        let weight = 1.0 / y;
        let dx = x - mean;
        let e = (-dx * dx / (2.0 * sigma * sigma)).exp();
        let f = p[0] * e;
        let jacobian = Vector3::new(
            e,
            f * dx / (sigma * sigma),
            f * dx * dx / (sigma * sigma * sigma),
        );
        alpha += weight * jacobian * jacobian.transpose();
        beta += weight * (y - f) * jacobian;
    }

    NormalEquations { alpha, beta }
}

/// 高斯峰拟合器
#[derive(Debug, Clone, Copy)]
pub struct PeakFitter {
    config: FitConfig,
}

impl PeakFitter {
    /// 创建拟合器
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// 在寻到该峰的谱上拟合
    pub fn fit(
        &self,
        spectrum: &SubtractedSpectrum,
        domain: &HistogramDomain,
        peak: &Peak,
    ) -> GaussianFit {
        let spread = self.config.spread;
        let low = peak.position_x - spread;
        let high = peak.position_x + spread;

        let points: Vec<(f64, f64)> = spectrum
            .values
            .iter()
            .enumerate()
            .map(|(i, &y)| (domain.bin_center(i), y))
            .filter(|&(x, y)| x >= low && x <= high && y > 0.0)
            .collect();

        let outcome = if points.len() < self.config.min_fit_points {
            FitOutcome::Failed(FitFailure::TooFewPoints {
                found: points.len(),
                required: self.config.min_fit_points,
            })
        } else {
            // 峰顶bin扣除本底后可能为0，此时用平滑高度作为幅度初值
            let amplitude = if peak.position_y > 0.0 {
                peak.position_y
            } else {
                peak.smoothed_height
            };
            let seed = Vector3::new(amplitude, peak.position_x, spread / SIGMA_SEED_DIVISOR);
            match self.minimize(&points, seed, low, high) {
                Ok(parameters) => FitOutcome::Converged(parameters),
                Err(failure) => FitOutcome::Failed(failure),
            }
        };

        if let FitOutcome::Failed(failure) = &outcome {
            tracing::debug!(
                channel = spectrum.channel_id,
                rank = peak.rank,
                %failure,
                "峰拟合失败"
            );
        }

        GaussianFit {
            peak_rank: peak.rank,
            fit_range_low: low,
            fit_range_high: high,
            points: points.len(),
            outcome,
        }
    }

    fn minimize(
        &self,
        points: &[(f64, f64)],
        seed: Vector3<f64>,
        low: f64,
        high: f64,
    ) -> Result<GaussianParameters, FitFailure> {
        if !seed.iter().all(|v| v.is_finite()) || seed[0] <= 0.0 {
            return Err(FitFailure::Degenerate {
                reason: "invalid seed",
            });
        }

        let mut p = seed;
        let mut chi2 = chi_square(points, &p);
        let mut lambda = INITIAL_LAMBDA;
        let mut iterations = 0;
        let mut converged = false;

        'outer: while iterations < self.config.max_iterations {
            iterations += 1;
            let normal = normal_equations(points, &p);

            loop {
                let mut damped = normal.alpha;
                for k in 0..3 {
                    damped[(k, k)] *= 1.0 + lambda;
                }
                let inverse = damped.try_inverse().ok_or(FitFailure::Degenerate {
                    reason: "singular normal matrix",
                })?;
                let step = inverse * normal.beta;

                let mut trial = p + step;
                trial[2] = trial[2].abs();
                let trial_chi2 = if trial[2] > 0.0 && trial.iter().all(|v| v.is_finite()) {
                    chi_square(points, &trial)
                } else {
                    f64::INFINITY
                };

                if trial_chi2 < chi2 {
                    let relative_change = (chi2 - trial_chi2) / chi2.max(f64::MIN_POSITIVE);
                    let max_step = (0..3)
                        .map(|k| step[k].abs() / (trial[k].abs() + 1e-12))
                        .fold(0.0, f64::max);
                    p = trial;
                    chi2 = trial_chi2;
                    lambda = (lambda / 10.0).max(1e-12);
                    if relative_change <= self.config.tolerance || max_step < 1e-10 {
                        converged = true;
                        break 'outer;
                    }
                    break;
                }

                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    // 任何方向都无法再降低χ²，当前点即极小值
                    converged = true;
                    break 'outer;
                }
            }
        }

        if !converged {
            return Err(FitFailure::DidNotConverge { iterations });
        }

        let (amplitude, mean, sigma) = (p[0], p[1], p[2]);
        if !(amplitude.is_finite() && mean.is_finite() && sigma.is_finite() && chi2.is_finite()) {
            return Err(FitFailure::Degenerate {
                reason: "non-finite parameters",
            });
        }
        if sigma <= 0.0 {
            return Err(FitFailure::Degenerate {
                reason: "non-positive sigma",
            });
        }
        if mean < low || mean > high {
            return Err(FitFailure::Degenerate {
                reason: "mean outside fit window",
            });
        }

        let covariance = normal_equations(points, &p)
            .alpha
            .try_inverse()
            .ok_or(FitFailure::Degenerate {
                reason: "singular covariance",
            })?;
        let error = |k: usize| covariance[(k, k)].max(0.0).sqrt();

        let ndf = points.len().saturating_sub(3);
        let probability = if ndf > 0 {
            ChiSquared::new(ndf as f64).ok().map(|dist| dist.sf(chi2))
        } else {
            None
        };

        Ok(GaussianParameters {
            amplitude,
            mean,
            sigma,
            amplitude_error: error(0),
            mean_error: error(1),
            sigma_error: error(2),
            chi_square: chi2,
            ndf,
            probability,
            iterations,
        })
    }
}

impl Default for PeakFitter {
    fn default() -> Self {
        Self::new(FitConfig::default())
    }
}
