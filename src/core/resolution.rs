//! 能量分辨率计算与刻度策略
//!
//! 分辨率定义为 `2.3548 × σ / μ × 100`（%），即FWHM相对峰位的比例。
//! 峰与物理谱线的对应关系由调用方通过 `CalibrationPolicy` 显式给出；
//! 无法对应的峰记为未解析，绝不张冠李戴。

use crate::core::gaussian_fit::{FitFailure, FitOutcome, GaussianFit};
use crate::error::{SpectroResult, config_error};
use crate::tools::constants::resolution::{CO60_LINES_KEV, FWHM_FACTOR};
use serde::{Deserialize, Serialize};

/// 峰→能量的刻度策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPolicy {
    /// 用粗刻度 `E ≈ gain·μ + offset` 把峰匹配到容差内最近的已知谱线
    ///
    /// 每条谱线至多分配给一个峰，距离最近者优先。
    NearestLine {
        lines_kev: Vec<f64>,
        rough_gain_kev_per_unit: f64,
        #[serde(default)]
        rough_offset_kev: f64,
        tolerance_kev: f64,
    },

    /// 按峰排名（从1开始）依次对应能量列表，超出列表的峰未解析
    ByRank { energies_kev: Vec<f64> },
}

impl CalibrationPolicy {
    /// Co-60：按排名对应 1173.228 / 1332.492 keV（配合升序排名）
    pub fn co60_by_rank() -> Self {
        Self::ByRank {
            energies_kev: CO60_LINES_KEV.to_vec(),
        }
    }

    /// Co-60：按粗刻度匹配最近谱线
    pub fn co60_nearest(gain_kev_per_unit: f64, offset_kev: f64, tolerance_kev: f64) -> Self {
        Self::NearestLine {
            lines_kev: CO60_LINES_KEV.to_vec(),
            rough_gain_kev_per_unit: gain_kev_per_unit,
            rough_offset_kev: offset_kev,
            tolerance_kev,
        }
    }

    /// 策略描述（用于日志输出）
    pub fn describe(&self) -> String {
        match self {
            Self::NearestLine {
                lines_kev,
                rough_gain_kev_per_unit,
                rough_offset_kev,
                tolerance_kev,
            } => format!(
                "nearest line {lines_kev:?} keV (gain {rough_gain_kev_per_unit}, offset {rough_offset_kev}, ±{tolerance_kev} keV)"
            ),
            Self::ByRank { energies_kev } => format!("by rank {energies_kev:?} keV"),
        }
    }

    /// 校验策略参数
    pub fn validate(&self) -> SpectroResult<()> {
        let check_energies = |energies: &[f64]| -> SpectroResult<()> {
            if energies.is_empty() {
                return Err(config_error("刻度能量列表为空 / calibration energy list is empty"));
            }
            if let Some(bad) = energies.iter().find(|e| !(e.is_finite() && **e > 0.0)) {
                return Err(config_error(format!(
                    "刻度能量必须为正 / calibration energy must be positive, got {bad}"
                )));
            }
            Ok(())
        };

        match self {
            Self::NearestLine {
                lines_kev,
                rough_gain_kev_per_unit,
                rough_offset_kev,
                tolerance_kev,
            } => {
                check_energies(lines_kev)?;
                if !(rough_gain_kev_per_unit.is_finite() && *rough_gain_kev_per_unit > 0.0) {
                    return Err(config_error(
                        "粗刻度增益必须为正 / rough gain must be positive",
                    ));
                }
                if !rough_offset_kev.is_finite() {
                    return Err(config_error("粗刻度偏移无效 / rough offset must be finite"));
                }
                if !(tolerance_kev.is_finite() && *tolerance_kev > 0.0) {
                    return Err(config_error("匹配容差必须为正 / tolerance must be positive"));
                }
                Ok(())
            }
            Self::ByRank { energies_kev } => check_energies(energies_kev),
        }
    }
}

/// 单峰分辨率报告
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub peak_rank: usize,
    pub mean: f64,
    pub sigma: f64,
    pub calibration_energy_kev: f64,
    /// 2.3548·σ/μ·100
    pub resolution_percent: f64,
    /// FWHM（定义域单位）
    pub fwhm: f64,
    /// 刻度能量处的FWHM（keV）
    pub fwhm_kev: f64,
}

/// 峰未能给出分辨率的原因
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// 高斯拟合失败
    FitFailed { failure: FitFailure },
    /// 刻度策略没有为该峰给出谱线
    NoCalibrationLine,
    /// 拟合均值不为正，分辨率无定义
    NonPositiveMean,
}

impl UnresolvedReason {
    /// 日志描述
    pub fn describe(&self) -> String {
        match self {
            Self::FitFailed { failure } => failure.to_string(),
            Self::NoCalibrationLine => "无对应谱线 / no calibration line".to_string(),
            Self::NonPositiveMean => "均值非正 / non-positive mean".to_string(),
        }
    }
}

/// 未解析的峰
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnresolvedPeak {
    pub peak_rank: usize,
    pub reason: UnresolvedReason,
}

/// 分辨率百分比，均值不为正时返回None
#[inline]
pub fn resolution_percent(mean: f64, sigma: f64) -> Option<f64> {
    (mean > 0.0).then(|| FWHM_FACTOR * sigma / mean * 100.0)
}

/// 分辨率计算器
#[derive(Debug, Clone)]
pub struct ResolutionCalculator {
    policy: CalibrationPolicy,
}

impl ResolutionCalculator {
    /// 使用给定刻度策略创建计算器
    pub fn new(policy: CalibrationPolicy) -> Self {
        Self { policy }
    }

    /// 由单个拟合与已知能量计算报告
    pub fn resolve(
        fit: &GaussianFit,
        energy_kev: f64,
    ) -> Result<ResolutionReport, UnresolvedReason> {
        let parameters = match fit.outcome {
            FitOutcome::Converged(parameters) => parameters,
            FitOutcome::Failed(failure) => return Err(UnresolvedReason::FitFailed { failure }),
        };
        let percent = resolution_percent(parameters.mean, parameters.sigma)
            .ok_or(UnresolvedReason::NonPositiveMean)?;

        Ok(ResolutionReport {
            peak_rank: fit.peak_rank,
            mean: parameters.mean,
            sigma: parameters.sigma,
            calibration_energy_kev: energy_kev,
            resolution_percent: percent,
            fwhm: FWHM_FACTOR * parameters.sigma,
            fwhm_kev: percent / 100.0 * energy_kev,
        })
    }

    /// 为每个拟合确定刻度能量（None表示策略未给出谱线）
    ///
    /// 返回值与 `fits` 一一对应。
    pub fn assign_energies(&self, fits: &[GaussianFit]) -> Vec<Option<f64>> {
        match &self.policy {
            CalibrationPolicy::ByRank { energies_kev } => fits
                .iter()
                .map(|fit| {
                    fit.peak_rank
                        .checked_sub(1)
                        .and_then(|index| energies_kev.get(index).copied())
                })
                .collect(),
            CalibrationPolicy::NearestLine {
                lines_kev,
                rough_gain_kev_per_unit,
                rough_offset_kev,
                tolerance_kev,
            } => {
                // (距离, 谱线, 拟合) 全部候选对，按距离贪心分配
                let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
                for (fit_index, fit) in fits.iter().enumerate() {
                    let Some(parameters) = fit.parameters() else {
                        continue;
                    };
                    let rough_energy = rough_gain_kev_per_unit * parameters.mean + rough_offset_kev;
                    for (line_index, &line) in lines_kev.iter().enumerate() {
                        let distance = (rough_energy - line).abs();
                        if distance <= *tolerance_kev {
                            pairs.push((distance, line_index, fit_index));
                        }
                    }
                }
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.2.cmp(&b.2)));

                let mut energies = vec![None; fits.len()];
                let mut line_taken = vec![false; lines_kev.len()];
                for (_, line_index, fit_index) in pairs {
                    if line_taken[line_index] || energies[fit_index].is_some() {
                        continue;
                    }
                    line_taken[line_index] = true;
                    energies[fit_index] = Some(lines_kev[line_index]);
                }
                energies
            }
        }
    }

    /// 对一个通道的全部拟合计算分辨率
    pub fn calibrate(&self, fits: &[GaussianFit]) -> (Vec<ResolutionReport>, Vec<UnresolvedPeak>) {
        let energies = self.assign_energies(fits);
        let mut reports = Vec::new();
        let mut unresolved = Vec::new();

        for (fit, energy) in fits.iter().zip(energies) {
            let outcome = match (fit.failure(), energy) {
                (Some(failure), _) => Err(UnresolvedReason::FitFailed { failure }),
                (None, None) => Err(UnresolvedReason::NoCalibrationLine),
                (None, Some(energy_kev)) => Self::resolve(fit, energy_kev),
            };

            match outcome {
                Ok(report) => reports.push(report),
                Err(reason) => {
                    tracing::warn!(rank = fit.peak_rank, reason = %reason.describe(), "峰未解析");
                    unresolved.push(UnresolvedPeak {
                        peak_rank: fit.peak_rank,
                        reason,
                    });
                }
            }
        }

        (reports, unresolved)
    }
}
