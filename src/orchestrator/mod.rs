//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量调度和流程组装，不做具体的评估判断。
//!
//! ## 模块划分
//!
//! ### `windowed` - 分批并发执行器
//! - 把有序列表切成不超过并发上限的连续批次
//! - 批内并发、批间串行
//! - 捕获单项 panic，结果按下标写回
//! - 在批次之间响应取消
//!
//! ### `batch_processor` - 批量评估调度器
//! - 驱动 `windowed` 执行评估
//! - 每张图片完成时回报一次进度
//! - 把每张图片的结局转换成 `AssessmentOutcome`
//!
//! ### `pipeline` - 质量评估流水线
//! - 文件 / URL / 表格三种入口
//! - 批次前的致命错误（解析失败、没有可用图片）
//! - 批次后的用量记录
//!
//! ## 层次关系
//!
//! ```text
//! pipeline (文件 / URL / 表格)
//!     ↓
//! batch_processor (Vec<WorkItem> → BatchResult)
//!     ↓
//! windowed (分批并发)
//!     ↓
//! services (能力层：assessment / spreadsheet / usage / archive)
//!     ↓
//! clients (评分服务 HTTP 客户端)
//! ```

pub mod batch_processor;
pub mod pipeline;
pub mod windowed;

// 重新导出主要类型
pub use batch_processor::{Assessor, BatchScheduler};
pub use pipeline::{FileInput, PipelineRun, QualityPipeline, SpreadsheetRun};
pub use windowed::{Settled, WindowedExecutor};
