//! 固定区间计数直方图
//!
//! 按通道把事件的 chargeLong 值累加到固定范围、固定bin数的直方图中。
//! 超出定义域的值被丢弃（记入underflow/overflow，不夹紧到边界bin）。

use crate::core::config::HistogramDomain;
use crate::events::EventRecord;
use serde::Serialize;

/// 单通道计数直方图
///
/// 累加结束后即不再修改；`counts` 之和不超过路由到该通道的事件数。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// 探测器通道号
    pub channel_id: usize,

    /// 定义域与分bin方式
    pub domain: HistogramDomain,

    /// 每个bin的计数，长度为 `domain.bin_count`
    counts: Vec<u64>,

    /// 低于下边界被丢弃的值
    underflow: u64,

    /// 不低于上边界被丢弃的值
    overflow: u64,
}

impl Histogram {
    /// 创建空直方图
    pub fn new(channel_id: usize, domain: HistogramDomain) -> Self {
        Self {
            channel_id,
            domain,
            counts: vec![0; domain.bin_count],
            underflow: 0,
            overflow: 0,
        }
    }

    /// 由已有计数构造（用于合成谱和测试）
    ///
    /// 长度不足时补零，多余部分截断。
    pub fn from_counts(channel_id: usize, domain: HistogramDomain, mut counts: Vec<u64>) -> Self {
        counts.resize(domain.bin_count, 0);
        Self {
            channel_id,
            domain,
            counts,
            underflow: 0,
            overflow: 0,
        }
    }

    /// 添加一个值，返回是否落入定义域
    pub fn fill(&mut self, value: f64) -> bool {
        match self.domain.bin_index(value) {
            Some(index) => {
                self.counts[index] += 1;
                true
            }
            None => {
                if value < self.domain.low {
                    self.underflow += 1;
                } else {
                    self.overflow += 1;
                }
                false
            }
        }
    }

    /// bin计数
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// 计数转换为浮点序列（供本底估计使用）
    pub fn counts_f64(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// 定义域内的总计数
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// 下溢丢弃数
    #[inline]
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// 上溢丢弃数
    #[inline]
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// 直方图是否没有任何计数
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }
}

/// 直方图构建统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    /// 输入事件总数
    pub total_events: u64,

    /// 通道号有效、被路由到某个直方图的事件数
    pub routed_events: u64,

    /// 通道号超出 [0, N) 被忽略的事件数
    pub ignored_channel: u64,

    /// 已路由但值超出定义域的事件数
    pub out_of_domain: u64,
}

/// 多通道直方图构建器
#[derive(Debug, Clone, Copy)]
pub struct HistogramBuilder {
    domain: HistogramDomain,
    channel_count: usize,
}

impl HistogramBuilder {
    /// 创建构建器
    pub fn new(domain: HistogramDomain, channel_count: usize) -> Self {
        Self {
            domain,
            channel_count,
        }
    }

    /// 从事件序列构建N个直方图
    ///
    /// 通道号不在 [0, N) 的事件被静默忽略，不产生错误。
    pub fn build<'a, I>(&self, events: I) -> (Vec<Histogram>, FillStats)
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut histograms: Vec<Histogram> = (0..self.channel_count)
            .map(|channel| Histogram::new(channel, self.domain))
            .collect();
        let mut stats = FillStats::default();

        for event in events {
            stats.total_events += 1;

            let Some(histogram) = usize::try_from(event.channel_id)
                .ok()
                .and_then(|channel| histograms.get_mut(channel))
            else {
                stats.ignored_channel += 1;
                continue;
            };

            stats.routed_events += 1;
            if !histogram.fill(event.charge_long as f64) {
                stats.out_of_domain += 1;
            }
        }

        tracing::debug!(
            total = stats.total_events,
            routed = stats.routed_events,
            ignored = stats.ignored_channel,
            out_of_domain = stats.out_of_domain,
            "直方图构建完成"
        );

        (histograms, stats)
    }
}
