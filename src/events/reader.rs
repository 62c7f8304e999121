//! 运行文件读取
//!
//! 支持两种文本格式：
//! - `.jsonl`：每行一个事件记录，空行跳过
//! - `.json`：事件记录数组
//!
//! 文件无法打开 → `InputUnavailable`（该运行被跳过）；记录解析失败 → `FormatError`（带行号）。

use super::record::EventRecord;
use crate::error::{SpectroResult, format_error, input_error};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// 事件序列来源
///
/// 每次调用 `read_events` 都从头给出完整序列。
pub trait EventSource: Send + Sync {
    /// 运行名称（日志和报告使用）
    fn name(&self) -> &str;

    /// 读取全部事件
    fn read_events(&self) -> SpectroResult<Vec<EventRecord>>;
}

/// 磁盘上的运行文件
#[derive(Debug, Clone)]
pub struct EventFile {
    path: PathBuf,
    name: String,
}

impl EventFile {
    /// 绑定文件路径（不立即打开）
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json_array(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    }

    fn open(&self) -> SpectroResult<File> {
        File::open(&self.path).map_err(|e| input_error(&self.path.display().to_string(), e))
    }
}

impl EventSource for EventFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_events(&self) -> SpectroResult<Vec<EventRecord>> {
        let reader = BufReader::new(self.open()?);

        if self.is_json_array() {
            return serde_json::from_reader(reader).map_err(|e| format_error(&self.name, e));
        }

        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = serde_json::from_str(trimmed).map_err(|e| {
                let context = format!("{} 第{}行 / line {}", self.name, index + 1, index + 1);
                format_error(&context, e)
            })?;
            events.push(record);
        }

        tracing::debug!(run = %self.name, events = events.len(), "运行文件读取完成");
        Ok(events)
    }
}

/// 内存中的事件序列
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    events: Vec<EventRecord>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, events: Vec<EventRecord>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }
}

impl EventSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_events(&self) -> SpectroResult<Vec<EventRecord>> {
        Ok(self.events.clone())
    }
}

/// 以JSON Lines格式写出事件
pub fn write_event_file(path: &Path, events: &[EventRecord]) -> SpectroResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, SpectroError};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gammameter_reader_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_jsonl_roundtrip_and_restartable() {
        let path = temp_path("roundtrip.jsonl");
        let events = vec![EventRecord::new(0, 900), EventRecord::new(1, 1050)];
        write_event_file(&path, &events).unwrap();

        let source = EventFile::new(&path);
        assert_eq!(source.read_events().unwrap(), events);
        assert_eq!(source.read_events().unwrap(), events, "第二次读取应得到相同序列");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let path = temp_path("blank.jsonl");
        std::fs::write(&path, "{\"Ch\":0,\"ChargeLong\":5}\n\n  \n{\"Ch\":1,\"ChargeLong\":6}\n").unwrap();

        let events = EventFile::new(&path).read_events().unwrap();
        assert_eq!(events.len(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_json_array_format() {
        let path = temp_path("array.json");
        std::fs::write(&path, r#"[{"Ch":0,"ChargeLong":5},{"Ch":3,"ChargeLong":7}]"#).unwrap();

        let events = EventFile::new(&path).read_events().unwrap();
        assert_eq!(events[1], EventRecord::new(3, 7));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let path = temp_path("broken.jsonl");
        std::fs::write(&path, "{\"Ch\":0}\n{\"Ch\":\n").unwrap();

        let err = EventFile::new(&path).read_events().unwrap_err();
        assert!(matches!(err, SpectroError::FormatError(_)));
        assert!(err.to_string().contains("line 2"), "{err}");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_input_unavailable() {
        let err = EventFile::new(temp_path("absent.jsonl")).read_events().unwrap_err();
        assert_eq!(ErrorCategory::from_error(&err), ErrorCategory::Input);
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new("mem", vec![EventRecord::new(2, 3)]);
        assert_eq!(source.name(), "mem");
        assert_eq!(source.read_events().unwrap().len(), 1);
    }
}
