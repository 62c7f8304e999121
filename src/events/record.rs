//! 事件记录

use serde::{Deserialize, Serialize};

/// 单个探测器事件
///
/// 字段名兼容采集软件的分支名（`Mod`/`Ch`/`FineTS`/`ChargeLong`/`ChargeShort`/`Signal`）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    /// 数字化模块号
    #[serde(alias = "Mod")]
    pub module_id: u8,

    /// 通道号
    #[serde(alias = "Ch")]
    pub channel_id: i32,

    /// 精细时间戳
    #[serde(alias = "FineTS")]
    pub fine_timestamp: f64,

    /// 长门积分电荷（直方图使用的量）
    #[serde(alias = "ChargeLong")]
    pub charge_long: u32,

    /// 短门积分电荷
    #[serde(alias = "ChargeShort")]
    pub charge_short: i32,

    /// 波形采样，分析中不使用
    #[serde(alias = "Signal", skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Vec<i16>>,
}

impl EventRecord {
    /// 只带通道号和电荷的事件
    pub fn new(channel_id: i32, charge_long: u32) -> Self {
        Self {
            channel_id,
            charge_long,
            ..Self::default()
        }
    }
}
