//! 报告写入端
//!
//! 多个分析任务共享一个日志文件时，文件只由一个写入线程持有，
//! 任务通过通道提交完整的日志块，块与块之间不会交错。

use crate::error::{SpectroError, SpectroResult};
use crossbeam_channel::{Sender, unbounded};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::JoinHandle;

/// 日志块接收端
pub trait ReportSink: Send + Sync {
    /// 提交一个完整的日志块
    fn submit(&self, block: String) -> SpectroResult<()>;
}

/// 单写者日志文件
pub struct LogFileSink {
    path: PathBuf,
    sender: Option<Sender<String>>,
    writer: Option<JoinHandle<std::io::Result<usize>>>,
}

impl LogFileSink {
    /// 创建日志文件并启动写入线程
    pub fn create(path: &Path) -> SpectroResult<Self> {
        let file = File::create(path)?;
        let (sender, receiver) = unbounded::<String>();

        let writer = std::thread::Builder::new()
            .name("report-writer".to_string())
            .spawn(move || -> std::io::Result<usize> {
                let mut out = BufWriter::new(file);
                let mut blocks = 0;
                for block in receiver {
                    out.write_all(block.as_bytes())?;
                    blocks += 1;
                }
                out.flush()?;
                Ok(blocks)
            })
            .map_err(|e| SpectroError::ResourceError(format!("写入线程创建失败: {e}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            sender: Some(sender),
            writer: Some(writer),
        })
    }

    /// 日志文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 关闭通道并等待写入线程结束，返回写入的块数
    pub fn finish(mut self) -> SpectroResult<usize> {
        self.sender.take();
        match self.writer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SpectroError::ResourceError("写入线程异常退出".to_string()))?
                .map_err(SpectroError::from),
            None => Ok(0),
        }
    }
}

impl ReportSink for LogFileSink {
    fn submit(&self, block: String) -> SpectroResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| SpectroError::ResourceError("日志已关闭".to_string()))?;
        sender
            .send(block)
            .map_err(|_| SpectroError::ResourceError("写入线程已退出".to_string()))
    }
}

impl Drop for LogFileSink {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

/// 内存中的日志块（测试和JSON模式使用）
#[derive(Debug, Default)]
pub struct MemorySink {
    blocks: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已提交的日志块
    pub fn blocks(&self) -> Vec<String> {
        self.blocks.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl ReportSink for MemorySink {
    fn submit(&self, block: String) -> SpectroResult<()> {
        self.blocks
            .lock()
            .map_err(|_| SpectroError::ResourceError("日志缓冲锁已损坏".to_string()))?
            .push(block);
        Ok(())
    }
}
