//! 批量图片调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **分批处理**：把图片按输入顺序切成不超过并发上限的批次，每批完成后再开始下一批
//! 2. **并发控制**：批内所有评估同时进行，同时在途的请求数不超过上限
//! 3. **失败隔离**：单张图片失败（包括 panic）只影响它自己的结果
//! 4. **进度回报**：每完成一张就回调一次，而不是每批回调一次
//! 5. **顺序保证**：结果按下标放回原位，与完成先后无关
//!
//! ## 设计特点
//!
//! - 不做具体评估，评估能力通过 [`Assessor`] 注入
//! - 不发请求、不读凭据、不记用量

use crate::config::Config;
use crate::error::AssessError;
use crate::models::{AssessmentOutcome, BatchResult, ProcessingProgress, QualityPolicy, WorkItem};
use crate::orchestrator::windowed::{Settled, WindowedExecutor};
use crate::services::AssessmentService;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 评估能力：一张图片 → 一个分数
#[async_trait]
pub trait Assessor: Send + Sync {
    async fn assess(&self, item: &WorkItem) -> Result<f64, AssessError>;
}

#[async_trait]
impl Assessor for AssessmentService {
    async fn assess(&self, item: &WorkItem) -> Result<f64, AssessError> {
        AssessmentService::assess(self, item).await
    }
}

/// 批量调度器
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    executor: WindowedExecutor,
    policy: QualityPolicy,
}

impl BatchScheduler {
    pub fn new(max_concurrent: usize, policy: QualityPolicy) -> Self {
        Self {
            executor: WindowedExecutor::new(max_concurrent),
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_concurrent_requests,
            QualityPolicy::new(config.quality_threshold),
        )
    }

    pub fn policy(&self) -> &QualityPolicy {
        &self.policy
    }

    pub fn max_concurrent(&self) -> usize {
        self.executor.window_size()
    }

    /// 评估全部图片
    ///
    /// 返回的结果与 `items` 等长、同序；`on_progress` 每完成一张调用一次，
    /// `completed_count` 严格递增。
    pub async fn run<A, P>(
        &self,
        items: &[WorkItem],
        assessor: &A,
        mut on_progress: P,
        cancel: Option<&CancellationToken>,
    ) -> BatchResult
    where
        A: Assessor + ?Sized,
        P: FnMut(&ProcessingProgress),
    {
        let total = items.len();
        log_batch_start(total, self.max_concurrent(), self.executor.window_count(total));

        let mut progress = ProcessingProgress::processing(total);
        let policy = self.policy;

        let settled = self
            .executor
            .run(
                items,
                cancel,
                |_, item| assessor.assess(item),
                |index, settled| {
                    log_item_settled(&items[index], settled, &policy);
                    progress.advance();
                    on_progress(&progress);
                },
            )
            .await;

        let outcomes = items
            .iter()
            .zip(settled)
            .map(|(item, settled)| match settled {
                Settled::Completed(Ok(score)) => AssessmentOutcome::scored(item, score, &policy),
                Settled::Completed(Err(e)) => AssessmentOutcome::failed(item, e),
                Settled::Panicked(message) => {
                    AssessmentOutcome::failed(item, AssessError::Internal(message))
                }
                Settled::Skipped => AssessmentOutcome::failed(item, AssessError::Cancelled),
            })
            .collect();

        let result = BatchResult::new(outcomes);
        log_batch_complete(&result);
        result
    }
}

// ========== 日志辅助函数 ==========

fn log_batch_start(total: usize, max_concurrent: usize, windows: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始评估 {} 张图片", total);
    info!("📋 将以每批 {} 个的方式处理，共 {} 批", max_concurrent, windows);
    info!("{}", "=".repeat(60));
}

fn log_item_settled(item: &WorkItem, settled: &Settled<Result<f64, AssessError>>, policy: &QualityPolicy) {
    match settled {
        Settled::Completed(Ok(score)) => {
            let label = if policy.is_high_quality(Some(*score)) {
                "高质量"
            } else {
                "低质量"
            };
            info!(
                "[图片 {}] ✓ {} - 质量分数: {:.3} ({}, 阈值 {})",
                item.id + 1,
                item.name(),
                score,
                label,
                policy.threshold
            );
        }
        Settled::Completed(Err(e)) => {
            warn!("[图片 {}] ❌ {} - {}", item.id + 1, item.name(), e);
        }
        Settled::Panicked(message) => {
            error!("[图片 {}] 任务执行失败: {}", item.id + 1, message);
        }
        Settled::Skipped => {}
    }
}

fn log_batch_complete(result: &BatchResult) {
    let summary = result.summary();
    info!("{}", "─".repeat(60));
    info!(
        "✓ 评估完成: 高质量 {}, 低质量 {} (其中失败 {}), 共 {}",
        summary.high_quality, summary.low_quality, summary.failed, summary.total
    );
    info!("{}", "─".repeat(60));
}
