//! 批处理状态管理模块
//!
//! 统一的批处理统计，串行和并行两种模式共用同一快照结构。

use crate::error::ErrorCategory;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 批处理统计快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStatsSnapshot {
    /// 成功分析的运行数
    pub processed: usize,
    /// 失败（被跳过）的运行数
    pub failed: usize,
    /// 成功运行给出的分辨率报告总数
    pub reports: usize,
    /// 错误分类统计（错误类型 -> 失败运行列表）
    pub error_stats: BTreeMap<ErrorCategory, Vec<String>>,
}

impl BatchStatsSnapshot {
    /// 成功率（百分比）
    pub fn success_rate(&self) -> f64 {
        let total = self.processed + self.failed;
        if total == 0 {
            0.0
        } else {
            self.processed as f64 / total as f64 * 100.0
        }
    }
}

/// 串行批处理统计
#[derive(Debug, Default)]
pub struct SerialBatchStats {
    inner: BatchStatsSnapshot,
}

impl SerialBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功分析
    #[inline]
    pub fn inc_processed(&mut self, reports: usize) -> usize {
        self.inner.processed += 1;
        self.inner.reports += reports;
        self.inner.processed
    }

    /// 记录一次失败并归类
    #[inline]
    pub fn inc_failed(&mut self, category: ErrorCategory, run_name: String) -> usize {
        self.inner.failed += 1;
        self.inner.error_stats.entry(category).or_default().push(run_name);
        self.inner.failed
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        self.inner.clone()
    }
}

/// 并行批处理统计（多线程安全）
///
/// 计数使用原子类型，错误分类使用锁；克隆共享同一状态。
#[derive(Debug, Clone, Default)]
pub struct ParallelBatchStats {
    processed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    reports: Arc<AtomicUsize>,
    error_stats: Arc<Mutex<BTreeMap<ErrorCategory, Vec<String>>>>,
}

impl ParallelBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功分析（线程安全）
    #[inline]
    pub fn inc_processed(&self, reports: usize) -> usize {
        self.reports.fetch_add(reports, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 记录一次失败并归类（线程安全）
    pub fn inc_failed(&self, category: ErrorCategory, run_name: String) -> usize {
        let count = self.failed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Ok(mut stats) = self.error_stats.lock() {
            stats.entry(category).or_default().push(run_name);
        }

        count
    }

    /// 获取统计快照
    ///
    /// 各失败运行列表按名称排序，保证与完成顺序无关。
    pub fn snapshot(&self) -> BatchStatsSnapshot {
        let mut error_stats = self
            .error_stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default();
        error_stats.values_mut().for_each(|runs| runs.sort());

        BatchStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            reports: self.reports.load(Ordering::Relaxed),
            error_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SpectroError, format_error, input_error};

    #[test]
    fn test_serial_stats_basic() {
        let mut stats = SerialBatchStats::new();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 0);
        assert!(snapshot.error_stats.is_empty());
        assert_eq!(snapshot.success_rate(), 0.0);

        assert_eq!(stats.inc_processed(2), 1);
        assert_eq!(stats.inc_processed(1), 2);

        let category = ErrorCategory::from_error(&format_error("run", "bad record"));
        assert_eq!(stats.inc_failed(category, "run_a.jsonl".to_string()), 1);
        assert_eq!(stats.inc_failed(category, "run_b.jsonl".to_string()), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.reports, 3);
        assert_eq!(snapshot.error_stats[&ErrorCategory::Format].len(), 2);
        assert!((snapshot.success_rate() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_serial_stats_multiple_categories() {
        let mut stats = SerialBatchStats::new();

        let format = ErrorCategory::from_error(&format_error("a", "b"));
        let input = ErrorCategory::from_error(&input_error("a", "missing"));

        stats.inc_failed(format, "1.jsonl".to_string());
        stats.inc_failed(input, "2.jsonl".to_string());
        stats.inc_failed(format, "3.jsonl".to_string());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.error_stats.len(), 2);
        assert_eq!(snapshot.error_stats[&format].len(), 2);
        assert_eq!(snapshot.error_stats[&input].len(), 1);
    }

    #[test]
    fn test_parallel_stats_concurrent_updates() {
        use rayon::prelude::*;

        let stats = ParallelBatchStats::new();
        (0..100).into_par_iter().for_each(|_| {
            stats.inc_processed(2);
        });

        let category =
            ErrorCategory::from_error(&SpectroError::InputUnavailable("gone".to_string()));
        (0..50).into_par_iter().for_each(|i| {
            stats.inc_failed(category, format!("run{i:02}.jsonl"));
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 100);
        assert_eq!(snapshot.reports, 200);
        assert_eq!(snapshot.failed, 50);
        let runs = &snapshot.error_stats[&category];
        assert_eq!(runs.len(), 50);
        assert!(runs.windows(2).all(|w| w[0] <= w[1]), "失败列表应已排序");
    }

    #[test]
    fn test_parallel_stats_clone_shares_state() {
        let first = ParallelBatchStats::new();
        first.inc_processed(0);

        let second = first.clone();
        second.inc_processed(0);

        assert_eq!(first.snapshot().processed, 2);
        assert_eq!(second.snapshot().processed, 2);
    }
}
