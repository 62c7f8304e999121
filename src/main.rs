//! GammaMeter - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成能谱分析任务。

use gammameter::{
    core::RunAnalysis,
    error::{ErrorCategory, SpectroError, SpectroResult},
    tools::{self, AppConfig, constants::defaults},
};
use std::process;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// 错误退出码定义
mod exit_codes {
    /// 通用错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 配置/格式错误
    pub const CONFIG_ERROR: i32 = 2;
    /// 输入不可用
    pub const INPUT_ERROR: i32 = 3;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 4;
}

/// 初始化诊断日志（stderr），过滤规则来自 GAMMAMETER_LOG
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(defaults::LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );
    // 重复初始化（例如测试中）静默忽略
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 获取错误建议文本
fn get_error_suggestion(error: &SpectroError) -> &'static str {
    match error {
        SpectroError::ResourceError(_) => {
            "资源不可用，请检查系统资源或重试；若持续失败请使用 --serial 或降低并发度 / Resource unavailable, retry with --serial or a lower --parallel-files"
        }
        _ => match ErrorCategory::from_error(error) {
            ErrorCategory::Configuration => {
                "检查分析参数与刻度策略（--co60、--rank-energies、--lines），使用 --help 查看完整用法 / Check analysis parameters and calibration policy, use --help for full usage"
            }
            ErrorCategory::Input | ErrorCategory::Io => {
                "检查文件路径是否正确，文件是否存在且可读 / Check that the path exists and is readable"
            }
            ErrorCategory::Format => {
                "运行文件须为JSON Lines（每行一个事件）或JSON数组 / Run files must be JSON Lines or a JSON array of events"
            }
            ErrorCategory::Other => {
                "请检查输入文件和参数设置 / Please check input files and parameters"
            }
        },
    }
}

/// 错误处理和建议
fn handle_error(error: SpectroError) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error}");
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(&error));

    let exit_code = match ErrorCategory::from_error(&error) {
        ErrorCategory::Configuration | ErrorCategory::Format => exit_codes::CONFIG_ERROR,
        ErrorCategory::Input => exit_codes::INPUT_ERROR,
        ErrorCategory::Other if matches!(error, SpectroError::ResourceError(_)) => {
            exit_codes::RESOURCE_ERROR
        }
        ErrorCategory::Io | ErrorCategory::Other => exit_codes::GENERAL_ERROR,
    };

    process::exit(exit_code);
}

/// 批量处理运行文件
fn process_batch_mode(config: &AppConfig) -> SpectroResult<()> {
    let run_files = tools::scan_run_files(&config.input_path, config.recursive, config.max_runs)?;

    tools::show_scan_results(config, &run_files);

    if run_files.is_empty() {
        return Ok(());
    }

    let output_path = tools::generate_batch_output_path(config);
    let sink = tools::LogFileSink::create(&output_path)?;
    tools::ReportSink::submit(
        &sink,
        tools::create_log_header(&config.input_path, &config.analysis, run_files.len()),
    )?;

    let outcome = match config.parallel_files {
        None => tools::process_batch_serial(&run_files, config, &sink)?,
        Some(degree) => {
            let actual_degree =
                tools::utils::effective_parallel_degree(degree, Some(run_files.len()));

            if actual_degree == 1 {
                if config.verbose {
                    println!("[INFO] 并发度为1，使用串行模式 / Parallelism=1, using serial mode");
                }
                tools::process_batch_serial(&run_files, config, &sink)?
            } else {
                match tools::process_batch_parallel(&run_files, config, actual_degree, &sink) {
                    Ok(outcome) => outcome,
                    Err(e @ SpectroError::ResourceError(_)) => {
                        eprintln!(
                            "[WARNING] 并行处理失败 / Parallel processing failed: {e}，回退到串行模式 / fallback to serial"
                        );
                        tools::process_batch_serial(&run_files, config, &sink)?
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    };

    let runs: Vec<&RunAnalysis> = outcome.runs.iter().collect();
    let summary = tools::create_summary_table(&runs);

    tools::ReportSink::submit(&sink, format!("{summary}\n\n"))?;
    tools::ReportSink::submit(
        &sink,
        tools::create_batch_footer(run_files.len(), &outcome.snapshot),
    )?;
    sink.finish()?;

    if config.json {
        println!("{}", tools::format_runs_json(&runs)?);
    } else if !runs.is_empty() {
        println!("{summary}");
    }

    tools::show_batch_completion_info(
        &output_path,
        outcome.snapshot.processed,
        run_files.len(),
        outcome.snapshot.failed,
    );
    Ok(())
}

/// 单运行处理模式
fn process_single_mode(config: &AppConfig) -> SpectroResult<()> {
    let run = tools::process_single_run_file(&config.input_path, &config.analysis)?;
    tools::output_results(&run, config)
}

/// 应用程序主逻辑
fn run() -> SpectroResult<()> {
    // 1. 解析命令行参数（非法配置在此拒绝）
    let config = tools::parse_args()?;
    init_logging(config.verbose);

    // 2. 显示启动信息
    tools::show_startup_info(&config);

    // 3. 根据模式选择处理方式
    if config.is_batch_mode() {
        process_batch_mode(&config)?;
    } else {
        process_single_mode(&config)?;
    }

    tools::show_completion_info(&config);
    Ok(())
}

fn main() {
    // 可选：CPU火焰图分析（需开启 feature: flame-prof 且设置 GAMMAMETER_FLAME=1）
    #[cfg(feature = "flame-prof")]
    let _guard = {
        let enabled = std::env::var("GAMMAMETER_FLAME")
            .map(|v| v == "1")
            .unwrap_or(false);
        if enabled {
            match pprof::ProfilerGuard::new(250) {
                Ok(g) => Some(g),
                Err(e) => {
                    eprintln!(
                        "[WARNING] 启用火焰图采样失败 / Failed to enable flame graph sampling: {e}"
                    );
                    None
                }
            }
        } else {
            None
        }
    };

    let result = run();

    // 在退出前生成火焰图（仅在启用时）
    #[cfg(feature = "flame-prof")]
    if let Some(guard) = _guard
        && let Ok(report) = guard.report().build()
    {
        use std::path::PathBuf;

        let mut options = pprof::flamegraph::Options::default();
        let out_path = std::env::var("GAMMAMETER_FLAME_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("flamegraph.svg"));
        if let Ok(file) = std::fs::File::create(&out_path)
            && report.flamegraph_with_options(file, &mut options).is_ok()
        {
            eprintln!(
                "FlameGraph generated successfully / 生成成功: {}",
                out_path.display()
            );
        }
    }

    if let Err(error) = result {
        handle_error(error);
    }
}
