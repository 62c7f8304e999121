//! 命令行接口模块
//!
//! 负责命令行参数解析、配置合成和程序信息展示。
//! 配置来源优先级：命令行参数 > `--config` JSON文件 > `tools::constants` 默认值。

use super::constants::defaults;
use crate::core::config::{AnalysisConfig, PeakOrder};
use crate::core::resolution::CalibrationPolicy;
use crate::error::{SpectroResult, config_error};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 输入文件路径（单运行模式）或扫描目录（批量模式）
    pub input_path: PathBuf,

    /// 是否显示详细信息
    pub verbose: bool,

    /// 输出文件路径（可选，批量模式时自动生成）
    pub output_path: Option<PathBuf>,

    /// 以JSON输出分析结果
    pub json: bool,

    /// 多运行并发度，None表示串行
    pub parallel_files: Option<usize>,

    /// 单次批处理最多分析的运行文件数
    pub max_runs: usize,

    /// 是否递归扫描子目录
    pub recursive: bool,

    /// 分析参数
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// 基于路径类型判断是否为批量模式
    #[inline]
    pub fn is_batch_mode(&self) -> bool {
        self.input_path.is_dir()
    }
}

/// 构建命令行定义
pub fn build_command() -> Command {
    Command::new("gammameter")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("GammaMeter Team")
        .arg(
            Arg::new("INPUT")
                .help("运行文件(.jsonl/.json)或目录路径。如果不指定，将扫描可执行文件所在目录")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("输出结果到文件（批量模式默认写入输入目录）")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("以JSON格式输出分析结果")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON分析配置文件（须包含calibration）")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("parallel-files")
                .long("parallel-files")
                .help("多运行并发度（默认4）")
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .help("串行处理多个运行文件")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-runs")
                .long("max-runs")
                .help("最多分析的运行文件数（默认50）")
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("recursive")
                .long("recursive")
                .short('r')
                .help("递归扫描子目录")
                .action(ArgAction::SetTrue),
        )
        // 刻度策略
        .arg(
            Arg::new("co60")
                .long("co60")
                .help("Co-60预设：按排名对应 1173.228 / 1332.492 keV")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("rank-energies")
                .long("rank-energies")
                .help("按峰排名对应的能量列表（keV，逗号分隔）")
                .value_name("KEV,...")
                .value_delimiter(',')
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("lines")
                .long("lines")
                .help("已知谱线能量（keV，逗号分隔），按粗刻度匹配最近谱线")
                .value_name("KEV,...")
                .value_delimiter(',')
                .value_parser(value_parser!(f64))
                .requires("rough-gain")
                .requires("tolerance"),
        )
        .arg(
            Arg::new("rough-gain")
                .long("rough-gain")
                .help("粗刻度增益（keV/道）")
                .value_name("KEV")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("rough-offset")
                .long("rough-offset")
                .help("粗刻度偏移（keV）")
                .value_name("KEV")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("tolerance")
                .long("tolerance")
                .help("谱线匹配容差（keV）")
                .value_name("KEV")
                .value_parser(value_parser!(f64)),
        )
        // 数值参数覆盖
        .arg(
            Arg::new("bins")
                .long("bins")
                .help("直方图bin数")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("low")
                .long("low")
                .help("直方图下边界")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("high")
                .long("high")
                .help("直方图上边界")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("channels")
                .long("channels")
                .help("通道数")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("iterations")
                .long("iterations")
                .help("本底削峰迭代次数")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("no-lls")
                .long("no-lls")
                .help("关闭LLS压缩变换")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sigma")
                .long("sigma")
                .help("寻峰预期峰宽（bin）")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .help("寻峰相对阈值 (0, 1]")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("order")
                .long("order")
                .help("峰排名顺序")
                .value_parser(["asc", "desc"]),
        )
        .arg(
            Arg::new("spread")
                .long("spread")
                .help("拟合窗口半宽")
                .value_parser(value_parser!(f64)),
        )
}

/// 解析进程命令行参数并创建配置
///
/// `--help`/`--version` 与语法错误由clap直接处理并退出。
pub fn parse_args() -> SpectroResult<AppConfig> {
    let matches = build_command().get_matches();
    config_from_matches(&matches)
}

/// 解析给定参数（首元素为程序名）
pub fn parse_args_from<I, T>(args: I) -> SpectroResult<AppConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command()
        .try_get_matches_from(args)
        .map_err(|e| config_error(e.to_string()))?;
    config_from_matches(&matches)
}

fn calibration_from_matches(matches: &ArgMatches) -> Option<CalibrationPolicy> {
    if let Some(lines) = matches.get_many::<f64>("lines") {
        return Some(CalibrationPolicy::NearestLine {
            lines_kev: lines.copied().collect(),
            rough_gain_kev_per_unit: matches.get_one::<f64>("rough-gain").copied().unwrap_or(0.0),
            rough_offset_kev: matches.get_one::<f64>("rough-offset").copied().unwrap_or(0.0),
            tolerance_kev: matches.get_one::<f64>("tolerance").copied().unwrap_or(0.0),
        });
    }
    if let Some(energies) = matches.get_many::<f64>("rank-energies") {
        return Some(CalibrationPolicy::ByRank {
            energies_kev: energies.copied().collect(),
        });
    }
    matches
        .get_flag("co60")
        .then(CalibrationPolicy::co60_by_rank)
}

fn config_from_matches(matches: &ArgMatches) -> SpectroResult<AppConfig> {
    let input_path = match matches.get_one::<String>("INPUT") {
        Some(input) => PathBuf::from(input),
        None => {
            // 双击启动模式：使用可执行文件所在目录
            let exe_path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
            super::utils::get_parent_dir(&exe_path).to_path_buf()
        }
    };

    let file_config = match matches.get_one::<String>("config") {
        Some(path) => Some(AnalysisConfig::from_json_file(&PathBuf::from(path))?),
        None => None,
    };

    let mut analysis = match (calibration_from_matches(matches), file_config) {
        (Some(calibration), Some(mut config)) => {
            config.calibration = calibration;
            config
        }
        (Some(calibration), None) => AnalysisConfig::new(calibration),
        (None, Some(config)) => config,
        (None, None) => {
            return Err(config_error(
                "必须提供刻度策略（--co60、--rank-energies、--lines 或 --config） / a calibration policy is required",
            ));
        }
    };

    if let Some(&bins) = matches.get_one::<usize>("bins") {
        analysis.domain.bin_count = bins;
    }
    if let Some(&low) = matches.get_one::<f64>("low") {
        analysis.domain.low = low;
    }
    if let Some(&high) = matches.get_one::<f64>("high") {
        analysis.domain.high = high;
    }
    if let Some(&channels) = matches.get_one::<usize>("channels") {
        analysis.channel_count = channels;
    }
    if let Some(&iterations) = matches.get_one::<usize>("iterations") {
        analysis.background.iterations = iterations;
    }
    if matches.get_flag("no-lls") {
        analysis.background.lls_transform = false;
    }
    if let Some(&sigma) = matches.get_one::<f64>("sigma") {
        analysis.peak_search.sigma = sigma;
    }
    if let Some(&threshold) = matches.get_one::<f64>("threshold") {
        analysis.peak_search.threshold = threshold;
    }
    if let Some(order) = matches.get_one::<String>("order") {
        analysis.peak_search.order = if order == "desc" {
            PeakOrder::Descending
        } else {
            PeakOrder::Ascending
        };
    }
    if let Some(&spread) = matches.get_one::<f64>("spread") {
        analysis.fit.spread = spread;
    }

    // 非法配置在任何运行开始之前拒绝
    analysis.validate()?;

    let parallel_files = if matches.get_flag("serial") {
        None
    } else {
        Some(
            matches
                .get_one::<usize>("parallel-files")
                .copied()
                .unwrap_or(defaults::PARALLEL_FILES_DEGREE),
        )
    };

    Ok(AppConfig {
        input_path,
        verbose: matches.get_flag("verbose"),
        output_path: matches.get_one::<String>("output").map(PathBuf::from),
        json: matches.get_flag("json"),
        parallel_files,
        max_runs: matches
            .get_one::<usize>("max-runs")
            .copied()
            .unwrap_or(defaults::MAX_RUNS),
        recursive: matches.get_flag("recursive"),
        analysis,
    })
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("GammaMeter v{VERSION} 启动 / started");
    println!("{DESCRIPTION}");
    if config.verbose {
        let analysis = &config.analysis;
        println!(
            "   定义域 / Domain: [{}, {}) x {} bins, {} channels",
            analysis.domain.low,
            analysis.domain.high,
            analysis.domain.bin_count,
            analysis.channel_count
        );
        println!(
            "   本底 / Background: K = {}, LLS = {}",
            analysis.background.iterations, analysis.background.lls_transform
        );
        println!(
            "   寻峰 / Peak search: sigma = {}, threshold = {}",
            analysis.peak_search.sigma, analysis.peak_search.threshold
        );
        println!("   拟合 / Fit: spread = {}", analysis.fit.spread);
        println!("   刻度 / Calibration: {}", analysis.calibration.describe());
    }
    println!();
}

/// 显示程序完成信息
pub fn show_completion_info(config: &AppConfig) {
    if config.verbose {
        println!("[OK] 所有任务处理完成 / All tasks completed");
    }
}
