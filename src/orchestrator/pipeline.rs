//! 质量评估流水线 - 编排层入口
//!
//! 把配置、凭据、评分客户端和用量统计组装在一起：
//!
//! ```text
//! 文件 / URL / 表格
//!     ↓ 解析、去空（失败或为空直接返回错误，不产生任何进度事件）
//! BatchScheduler（分批并发评估，每张一个进度事件）
//!     ↓
//! UsageTracker（记录本批用量，接近上限时提醒）
//! ```

use crate::clients::ScoringApi;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    BatchResult, ProcessingProgress, UsageRecord, UsageSource, WorkItem,
};
use crate::orchestrator::batch_processor::BatchScheduler;
use crate::services::{
    ArchiveItem, AssessmentService, CredentialStore, SpreadsheetParser, UsageTracker,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 一个待上传的本地文件
#[derive(Debug, Clone, PartialEq)]
pub struct FileInput {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// 一次批量评估的完整结果
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub items: Vec<WorkItem>,
    pub result: BatchResult,
    /// 用量写入失败时为 None（评估结果仍然有效）
    pub usage: Option<UsageRecord>,
}

impl PipelineRun {
    /// 高质量图片，按输入顺序，用于打包下载
    pub fn archive_items(&self) -> Vec<ArchiveItem> {
        self.items
            .iter()
            .zip(&self.result.outcomes)
            .filter(|(_, outcome)| outcome.is_high_quality)
            .map(|(item, _)| ArchiveItem::from_work_item(item))
            .collect()
    }
}

/// 表格评估结果：批次结果 + 解析时被拒绝的行
#[derive(Debug, Clone)]
pub struct SpreadsheetRun {
    pub run: PipelineRun,
    pub invalid_entries: Vec<String>,
}

/// 质量评估流水线
pub struct QualityPipeline {
    config: Config,
    scheduler: BatchScheduler,
    service: AssessmentService,
    usage: Arc<UsageTracker>,
}

impl QualityPipeline {
    pub fn new(
        config: Config,
        api: Arc<dyn ScoringApi>,
        credentials: Arc<dyn CredentialStore>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        let scheduler = BatchScheduler::from_config(&config);
        let service = AssessmentService::new(api, credentials, &config);
        Self {
            config,
            scheduler,
            service,
            usage,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// 评估本地上传的文件
    pub async fn assess_files<P>(
        &self,
        files: Vec<FileInput>,
        on_progress: P,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<PipelineRun>
    where
        P: FnMut(&ProcessingProgress),
    {
        if files.is_empty() {
            return Err(AppError::no_usable_items("没有选择任何图片文件"));
        }

        let items = files
            .into_iter()
            .enumerate()
            .map(|(id, file)| WorkItem::file(id, file.name, file.mime_type, file.bytes))
            .collect();

        self.run_batch(items, UsageSource::File, None, on_progress, cancel)
            .await
    }

    /// 评估一组图片 URL
    pub async fn assess_urls<P>(
        &self,
        urls: Vec<String>,
        on_progress: P,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<PipelineRun>
    where
        P: FnMut(&ProcessingProgress),
    {
        if urls.is_empty() {
            return Err(AppError::no_usable_items("没有可用的图片链接"));
        }

        self.run_batch(
            WorkItem::from_urls(urls),
            UsageSource::Spreadsheet,
            None,
            on_progress,
            cancel,
        )
        .await
    }

    /// 解析表格并评估其中的图片链接
    ///
    /// 解析失败或没有任何有效链接时直接返回错误，此时不会调用 `on_progress`。
    pub async fn assess_spreadsheet<P>(
        &self,
        bytes: &[u8],
        parser: &dyn SpreadsheetParser,
        file_name: Option<&str>,
        on_progress: P,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<SpreadsheetRun>
    where
        P: FnMut(&ProcessingProgress),
    {
        info!(
            "📄 使用 {} 策略解析表格 {}",
            parser.name(),
            file_name.unwrap_or("(未命名)")
        );

        let parsed = parser.parse(bytes)?;
        if !parsed.invalid_entries.is_empty() {
            warn!("⚠️  {} 行被拒绝:", parsed.invalid_entries.len());
            for entry in &parsed.invalid_entries {
                warn!("   {}", entry);
            }
        }

        if parsed.urls.is_empty() {
            return Err(AppError::no_usable_items(format!(
                "表格中没有有效的图片链接（被拒绝 {} 行）",
                parsed.invalid_entries.len()
            )));
        }

        let run = self
            .run_batch(
                WorkItem::from_urls(parsed.urls),
                UsageSource::Spreadsheet,
                file_name,
                on_progress,
                cancel,
            )
            .await?;

        Ok(SpreadsheetRun {
            run,
            invalid_entries: parsed.invalid_entries,
        })
    }

    async fn run_batch<P>(
        &self,
        items: Vec<WorkItem>,
        source: UsageSource,
        file_name: Option<&str>,
        on_progress: P,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<PipelineRun>
    where
        P: FnMut(&ProcessingProgress),
    {
        if self.usage.is_limit_exceeded() {
            let stats = self.usage.stats();
            warn!(
                "⚠️  本月 API 调用已达上限 ({}/{})，继续请求可能被评分服务拒绝",
                stats.total_api_calls, stats.monthly_limit
            );
        }

        let result = self
            .scheduler
            .run(&items, &self.service, on_progress, cancel)
            .await;

        let usage = match self
            .usage
            .record_batch(&result.usage_report(source), file_name)
        {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("用量记录失败: {}", e);
                None
            }
        };

        if self.usage.is_approaching_limit() {
            let stats = self.usage.stats();
            warn!(
                "⚠️  本月 API 调用已用 {}/{}，剩余 {} 次",
                stats.total_api_calls,
                stats.monthly_limit,
                stats.remaining_calls()
            );
        }

        Ok(PipelineRun {
            items,
            result,
            usage,
        })
    }
}
