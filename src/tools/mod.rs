//! 工具模块集合
//!
//! 包含CLI、运行文件扫描与处理、报告写入和格式化等工具模块，支持main.rs的流程控制。

pub mod batch_state;
pub mod cli;
pub mod constants;
pub mod formatter;
pub mod parallel_processor;
pub mod processor;
pub mod report_sink;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use batch_state::{BatchStatsSnapshot, ParallelBatchStats, SerialBatchStats};
pub use cli::{AppConfig, parse_args, parse_args_from, show_completion_info, show_startup_info};
pub use formatter::{
    create_batch_footer, create_log_header, create_summary_table, format_run_block,
    format_run_json, format_runs_json,
};
pub use parallel_processor::process_batch_parallel;
pub use processor::{
    BatchOutcome, output_results, process_batch_serial, process_single_run_file, summarize_run,
};
pub use report_sink::{LogFileSink, MemorySink, ReportSink};
pub use scanner::{
    generate_batch_output_path, scan_run_files, show_batch_completion_info, show_scan_results,
};
