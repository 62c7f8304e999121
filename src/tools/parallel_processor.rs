//! 多运行并行处理模块
//!
//! 使用专用rayon线程池实现运行级并行。每个任务独立持有自己的分析数据，
//! 日志块通过共享写入端提交；汇总结果按输入顺序返回。

use super::batch_state::ParallelBatchStats;
use super::cli::AppConfig;
use super::processor::{BatchOutcome, process_single_run_file, summarize_run};
use super::report_sink::ReportSink;
use super::{formatter, utils};
use crate::core::analyzer::RunAnalysis;
use crate::error::{ErrorCategory, SpectroError, SpectroResult};
use rayon::prelude::*;
use std::path::PathBuf;

/// 有序结果容器
struct OrderedResult {
    /// 原始文件索引（用于排序）
    index: usize,

    /// 成功时的分析结果
    run: Option<RunAnalysis>,
}

/// 多运行并行处理
///
/// 线程池创建失败返回 `ResourceError`，调用方可回退到串行模式。
pub fn process_batch_parallel(
    run_files: &[PathBuf],
    config: &AppConfig,
    parallel_degree: usize,
    sink: &dyn ReportSink,
) -> SpectroResult<BatchOutcome> {
    println!("[INFO] 启用多运行并行处理 / Parallel runs: {parallel_degree}");

    let stats = ParallelBatchStats::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallel_degree)
        .thread_name(|i| format!("gamma-worker-{i}"))
        .build()
        .map_err(|e| SpectroError::ResourceError(format!("线程池创建失败: {e}")))?;

    let results: Vec<SpectroResult<OrderedResult>> = pool.install(|| {
        run_files
            .par_iter()
            .enumerate()
            .map(|(index, run_file)| {
                let run_name = utils::extract_filename_lossy(run_file);

                match process_single_run_file(run_file, &config.analysis) {
                    Ok(run) => {
                        let count = stats.inc_processed(run.report_count());
                        sink.submit(formatter::format_run_block(&run))?;
                        if config.verbose {
                            println!(
                                "[OK] [{count}/{}] {run_name}: {}",
                                run_files.len(),
                                summarize_run(&run)
                            );
                        }
                        Ok(OrderedResult {
                            index,
                            run: Some(run),
                        })
                    }
                    Err(e) => {
                        let category = ErrorCategory::from_error(&e);
                        tracing::warn!(run = %run_name, error = %e, "运行被跳过");
                        println!("[FAIL] {run_name} - [{}] {e}", category.display_name());
                        sink.submit(formatter::format_failed_run(&run_name, &e))?;
                        stats.inc_failed(category, run_name);
                        Ok(OrderedResult { index, run: None })
                    }
                }
            })
            .collect()
    });

    // 按原始顺序排序（写入端错误在此处向上传播）
    let mut ordered = results.into_iter().collect::<SpectroResult<Vec<_>>>()?;
    ordered.sort_by_key(|r| r.index);

    Ok(BatchOutcome {
        runs: ordered.into_iter().filter_map(|r| r.run).collect(),
        snapshot: stats.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AnalysisConfig;
    use crate::core::resolution::CalibrationPolicy;
    use crate::events::{EventRecord, SyntheticRun, write_event_file};
    use crate::tools::processor::process_batch_serial;
    use crate::tools::report_sink::MemorySink;

    fn app_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            input_path: dir.to_path_buf(),
            verbose: false,
            output_path: None,
            json: false,
            parallel_files: Some(3),
            max_runs: 50,
            recursive: false,
            analysis: AnalysisConfig::new(CalibrationPolicy::co60_by_rank()),
        }
    }

    #[test]
    fn test_parallel_matches_serial_and_keeps_order() {
        let dir = std::env::temp_dir().join(format!("gammameter_parallel_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut files = Vec::new();
        for i in 0..4 {
            let path = dir.join(format!("run_{i}.jsonl"));
            let events = if i == 2 {
                vec![EventRecord::new(0, 100)]
            } else {
                SyntheticRun::co60_like(i % 2).generate().unwrap()
            };
            write_event_file(&path, &events).unwrap();
            files.push(path);
        }
        files.push(dir.join("missing.jsonl"));

        let config = app_config(&dir);
        let serial_sink = MemorySink::new();
        let parallel_sink = MemorySink::new();

        let serial = process_batch_serial(&files, &config, &serial_sink).unwrap();
        let parallel = process_batch_parallel(&files, &config, 3, &parallel_sink).unwrap();

        assert_eq!(serial.runs, parallel.runs, "并行结果应与串行一致");
        assert_eq!(serial.snapshot, parallel.snapshot);
        assert_eq!(parallel.snapshot.processed, 4);
        assert_eq!(parallel.snapshot.failed, 1);
        let names: Vec<&str> = parallel.runs.iter().map(|r| r.run_name.as_str()).collect();
        assert_eq!(names, vec!["run_0.jsonl", "run_1.jsonl", "run_2.jsonl", "run_3.jsonl"]);
        assert_eq!(parallel_sink.blocks().len(), 5);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
