//! # Image Quality Gate
//!
//! 批量评估图片质量（Sightengine `quality` 模型），按阈值筛选出高质量图片。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 只负责与评分服务通信，不做业务判断
//! - `SightengineClient` - 文件走 multipart 上传，URL 走查询参数
//! - `MockScoringApi` - 测试用，预设响应并统计并发峰值
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单张图片或单个文件
//! - `AssessmentService` - 请求前校验 → 调用 → 解释响应
//! - `CredentialStore` / `UsageTracker` - 凭据与用量，由调用方注入
//! - `spreadsheet` - 从表格中提取图片链接（两种策略）
//! - `ZipBundler` - 打包高质量图片
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/windowed` - 分批并发执行器
//! - `orchestrator/batch_processor` - 批量评估调度器，管理并发和进度
//! - `orchestrator/pipeline` - 入口：文件 / URL / 表格 → 结果 + 用量
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{MockScoringApi, ScoringApi, SightengineClient};
pub use config::Config;
pub use error::{AppError, AppResult, AssessError};
pub use models::{AssessmentOutcome, BatchResult, ProcessingProgress, QualityPolicy, WorkItem};
pub use orchestrator::{BatchScheduler, FileInput, PipelineRun, QualityPipeline, SpreadsheetRun};
pub use services::{
    ArchiveBundler, AssessmentService, CredentialStore, Credentials, FileCredentialStore,
    FirstColumnParser, HeaderLinkParser, MemoryCredentialStore, SpreadsheetParser, UsageTracker,
    ZipBundler,
};
