//! 工具函数模块
//!
//! 文件路径处理与并发度计算。

/// 文件路径处理工具函数
pub mod path {
    use std::path::Path;

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 获取父目录，如果不存在则返回当前目录
    #[inline]
    pub fn get_parent_dir(path: &Path) -> &Path {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// 计算实际并发度
///
/// 请求值夹紧到 [MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE]，且不超过任务数。
pub fn effective_parallel_degree(requested: usize, task_count: Option<usize>) -> usize {
    use super::constants::parallel_limits::{MAX_PARALLEL_DEGREE, MIN_PARALLEL_DEGREE};

    let degree = requested.clamp(MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE);
    match task_count {
        Some(count) => degree.min(count.max(1)),
        None => degree,
    }
}

pub use path::{extract_filename_lossy, get_parent_dir};
