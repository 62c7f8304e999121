//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 直方图默认参数（参考配置：2000 bins 覆盖 [0, 2000)）
pub mod histogram {
    /// 直方图下边界
    pub const LOW_EDGE: f64 = 0.0;

    /// 直方图上边界（不含）
    pub const HIGH_EDGE: f64 = 2000.0;

    /// bin数量，与上下边界组合得到 1.0 单位/bin
    pub const BIN_COUNT: usize = 2000;

    /// 每次采集的探测器通道数
    pub const CHANNEL_COUNT: usize = 4;
}

/// 本底估计（SNIP削峰）默认参数
pub mod background {
    /// 削峰迭代次数K，窗口半宽依次为 1..=K
    pub const ITERATIONS: usize = 20;

    /// 默认启用LLS压缩变换
    pub const LLS_TRANSFORM: bool = true;
}

/// 寻峰默认参数
pub mod peak_search {
    /// 预期峰宽（bin），同时作为平滑核宽度和最小峰间距
    pub const SIGMA: f64 = 30.5;

    /// 相对阈值：保留平滑高度 >= 阈值 × 最高峰 的候选
    pub const THRESHOLD: f64 = 0.5;

    /// 平滑核截断半径（以sigma为单位）
    pub const KERNEL_TRUNCATE: f64 = 3.0;
}

/// 高斯拟合默认参数
pub mod fit {
    /// 拟合窗口半宽（定义域单位），Co-60 参考值
    pub const SPREAD: f64 = 30.0;

    /// 初始sigma = spread / SIGMA_SEED_DIVISOR
    pub const SIGMA_SEED_DIVISOR: f64 = 3.0;

    /// 窗口内最少非零bin数（3个自由参数之外至少留2个自由度）
    pub const MIN_FIT_POINTS: usize = 5;

    /// LM迭代上限，防止病态数据下不收敛
    pub const MAX_ITERATIONS: usize = 200;

    /// χ²相对变化收敛容差
    pub const TOLERANCE: f64 = 1e-10;

    /// LM初始阻尼系数
    pub const INITIAL_LAMBDA: f64 = 1e-3;

    /// 阻尼系数上限，超过即视为停滞
    pub const MAX_LAMBDA: f64 = 1e12;
}

/// 能量分辨率常量
pub mod resolution {
    /// FWHM = 2√(2 ln 2) · σ
    pub const FWHM_FACTOR: f64 = 2.3548;

    /// Co-60 两条γ射线能量（keV）
    pub const CO60_LINES_KEV: [f64; 2] = [1173.228, 1332.492];
}

/// 默认配置值
pub mod defaults {
    /// 默认多运行文件并行并发度
    ///
    /// 每个运行文件的分析彼此独立，4并发度在多数场景下提供良好的性能/资源平衡
    pub const PARALLEL_FILES_DEGREE: usize = 4;

    /// 单次批处理最多分析的运行文件数
    pub const MAX_RUNS: usize = 50;

    /// 日志过滤环境变量
    pub const LOG_ENV: &str = "GAMMAMETER_LOG";
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 限制最大并发度为16，避免过度并发导致的上下文切换开销和内存占用过高
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}
