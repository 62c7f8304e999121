//! 运行文件扫描模块
//!
//! 扫描目录中的运行文件（`.jsonl`/`.json`），按路径排序并截断到 `max_runs`。

use super::cli::AppConfig;
use super::utils;
use crate::error::{SpectroError, SpectroResult, input_error};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 支持的运行文件扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jsonl", "json"];

fn is_run_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// 扫描目录中的运行文件
///
/// 默认不递归子目录；结果按路径排序后截断到 `max_runs` 个。
pub fn scan_run_files(
    dir_path: &Path,
    recursive: bool,
    max_runs: usize,
) -> SpectroResult<Vec<PathBuf>> {
    if !dir_path.exists() {
        return Err(input_error(&dir_path.display().to_string(), "目录不存在 / directory not found"));
    }
    if !dir_path.is_dir() {
        return Err(SpectroError::InputUnavailable(format!(
            "路径不是目录 / not a directory: {}",
            dir_path.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut run_files = Vec::new();
    for entry in WalkDir::new(dir_path).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(|e| input_error(&dir_path.display().to_string(), e))?;
        if entry.file_type().is_file() && is_run_file(entry.path()) {
            run_files.push(entry.into_path());
        }
    }

    run_files.sort();
    if run_files.len() > max_runs {
        tracing::warn!(
            found = run_files.len(),
            max_runs,
            "运行文件数超过上限，多余文件将被忽略"
        );
        run_files.truncate(max_runs);
    }

    Ok(run_files)
}

/// 显示文件扫描结果
pub fn show_scan_results(config: &AppConfig, run_files: &[PathBuf]) {
    if run_files.is_empty() {
        println!(
            "[WARNING] 在目录 {} 中没有找到运行文件 / No run files found",
            config.input_path.display()
        );
        println!("   支持的格式 / Supported formats: JSONL, JSON");
        return;
    }

    println!("扫描目录 / Scanning: {}", config.input_path.display());
    println!("找到 {} 个运行文件 / Found {} run files", run_files.len(), run_files.len());

    if config.verbose {
        for (i, file) in run_files.iter().enumerate() {
            println!("   {}. {}", i + 1, utils::extract_filename_lossy(file));
        }
    }
    println!();
}

/// 生成批量输出文件路径
pub fn generate_batch_output_path(config: &AppConfig) -> PathBuf {
    config.output_path.clone().unwrap_or_else(|| {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        config
            .input_path
            .join(format!("gammameter_{timestamp}.log"))
    })
}

/// 显示批量处理完成信息
pub fn show_batch_completion_info(
    output_path: &Path,
    processed_count: usize,
    total_count: usize,
    failed_count: usize,
) {
    println!();
    println!("批量处理完成 / Batch completed");
    println!("   成功处理 / Processed: {processed_count} / {total_count}");
    if failed_count > 0 {
        println!("   失败运行 / Failed: {failed_count}");
    }
    println!("   日志文件 / Log file: {}", output_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gammameter_scan_{}_{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_filters_sorts_and_truncates() {
        let dir = temp_dir("filter");
        for name in ["c.jsonl", "a.JSON", "b.jsonl", "notes.txt"] {
            fs::write(dir.join(name), "").unwrap();
        }

        let all = scan_run_files(&dir, false, 50).unwrap();
        let names: Vec<String> = all.iter().map(|p| utils::extract_filename_lossy(p)).collect();
        assert_eq!(names, vec!["a.JSON", "b.jsonl", "c.jsonl"]);

        let limited = scan_run_files(&dir, false, 2).unwrap();
        assert_eq!(limited.len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_recursion_is_opt_in() {
        let dir = temp_dir("recursive");
        fs::create_dir_all(dir.join("day2")).unwrap();
        fs::write(dir.join("run1.jsonl"), "").unwrap();
        fs::write(dir.join("day2").join("run2.jsonl"), "").unwrap();

        assert_eq!(scan_run_files(&dir, false, 50).unwrap().len(), 1);
        assert_eq!(scan_run_files(&dir, true, 50).unwrap().len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory() {
        let missing = std::env::temp_dir().join("gammameter_scan_definitely_missing");
        assert!(matches!(
            scan_run_files(&missing, false, 50),
            Err(SpectroError::InputUnavailable(_))
        ));
    }
}
