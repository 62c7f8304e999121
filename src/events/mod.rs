//! 事件数据访问模块
//!
//! 采集运行的事件记录读取与生成。分析核心只需要 `channel_id` 和 `charge_long`，
//! 其余字段原样保留以便输出和调试。

pub mod reader;
pub mod record;
pub mod synthetic;

pub use reader::{EventFile, EventSource, MemorySource, write_event_file};
pub use record::EventRecord;
pub use synthetic::{GaussianCluster, SyntheticRun};
