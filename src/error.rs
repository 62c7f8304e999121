//! 统一错误处理框架
//!
//! 运行级错误（配置、输入、格式、资源）的类型定义，以及批量统计使用的错误分类。
//! 单个峰的拟合失败不属于错误，见 `core::gaussian_fit::FitFailure`。

use std::fmt;
use std::io;
use thiserror::Error;

/// 能谱分析相关的统一错误类型
#[derive(Debug, Error)]
pub enum SpectroError {
    /// 配置无效（启动前拒绝，属于致命错误）
    #[error("配置无效 / Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// 数据访问失败：运行文件无法提供事件（该运行被跳过）
    #[error("输入不可用 / Input unavailable: {0}")]
    InputUnavailable(String),

    /// 文件I/O错误
    #[error("文件I/O错误 / I/O error: {0}")]
    IoError(#[from] io::Error),

    /// 事件记录格式错误
    #[error("事件格式错误 / Format error: {0}")]
    FormatError(String),

    /// 资源访问错误（线程池、写入线程等）
    #[error("资源访问错误 / Resource error: {0}")]
    ResourceError(String),
}

impl From<serde_json::Error> for SpectroError {
    fn from(err: serde_json::Error) -> Self {
        SpectroError::FormatError(format!("JSON解析失败: {err}"))
    }
}

/// 能谱分析操作的标准Result类型
pub type SpectroResult<T> = Result<T, SpectroError>;

// ==================== 错误转换Helper函数 ====================

/// 创建格式错误的helper函数
#[inline]
pub fn format_error<E: fmt::Display>(context: &str, err: E) -> SpectroError {
    SpectroError::FormatError(format!("{context}: {err}"))
}

/// 创建输入不可用错误的helper函数
#[inline]
pub fn input_error<E: fmt::Display>(context: &str, err: E) -> SpectroError {
    SpectroError::InputUnavailable(format!("{context}: {err}"))
}

/// 创建配置错误的helper函数
#[inline]
pub fn config_error(msg: impl Into<String>) -> SpectroError {
    SpectroError::InvalidConfiguration(msg.into())
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的错误统计和分析

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// 配置错误
    Configuration,
    /// 输入不可用（文件缺失、无法打开等）
    Input,
    /// 事件记录格式错误
    Format,
    /// I/O相关错误
    Io,
    /// 其他未分类错误
    Other,
}

impl ErrorCategory {
    /// 从SpectroError提取错误类别
    pub fn from_error(e: &SpectroError) -> Self {
        match e {
            SpectroError::InvalidConfiguration(_) => Self::Configuration,
            SpectroError::InputUnavailable(_) => Self::Input,
            SpectroError::FormatError(_) => Self::Format,
            SpectroError::IoError(_) => Self::Io,
            SpectroError::ResourceError(_) => Self::Other,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Configuration => "配置错误",
            Self::Input => "输入不可用",
            Self::Format => "格式错误",
            Self::Io => "I/O错误",
            Self::Other => "其他错误",
        }
    }
}
