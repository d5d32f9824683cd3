//! 批次结果汇总

use crate::models::outcome::AssessmentOutcome;
use crate::models::usage::{UsageReport, UsageSource};
use serde::Serialize;
use std::cmp::Ordering;

/// 汇总计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub high_quality: usize,
    /// 低质量，包含所有失败的图片
    pub low_quality: usize,
    pub failed: usize,
    pub total: usize,
}

/// 批次结果
///
/// `outcomes` 与输入列表等长、同序，任何情况下都不丢项。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<AssessmentOutcome>,
}

impl BatchResult {
    pub fn new(outcomes: Vec<AssessmentOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn high_quality_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_high_quality).count()
    }

    pub fn low_quality_count(&self) -> usize {
        self.total() - self.high_quality_count()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            high_quality: self.high_quality_count(),
            low_quality: self.low_quality_count(),
            failed: self.outcomes.iter().filter(|o| o.error.is_some()).count(),
            total: self.total(),
        }
    }

    pub fn high_quality(&self) -> Vec<&AssessmentOutcome> {
        self.outcomes.iter().filter(|o| o.is_high_quality).collect()
    }

    pub fn low_quality(&self) -> Vec<&AssessmentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_high_quality).collect()
    }

    /// 按分数从高到低的展示顺序（稳定排序，无分数的排在最后），不改变原始顺序
    pub fn sorted_by_score(&self) -> Vec<&AssessmentOutcome> {
        let mut sorted: Vec<&AssessmentOutcome> = self.outcomes.iter().collect();
        sorted.sort_by(|a, b| match (a.score, b.score) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        sorted
    }

    /// 拿到数值分数的数量
    pub fn successful_calls(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// 处理过的数量，取消的图片也算在内（但不算成功调用）
    pub fn processed_count(&self) -> usize {
        self.total()
    }

    pub fn usage_report(&self, source: UsageSource) -> UsageReport {
        UsageReport {
            successful_calls: self.successful_calls() as u64,
            items_processed: self.processed_count() as u64,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssessError;
    use crate::models::outcome::QualityPolicy;
    use crate::models::work_item::WorkItem;

    fn sample() -> BatchResult {
        let policy = QualityPolicy::new(0.82);
        let items = WorkItem::from_urls(["https://x/a.jpg", "https://x/b.jpg", "https://x/c.jpg", "https://x/d.jpg"]);
        BatchResult::new(vec![
            AssessmentOutcome::scored(&items[0], 0.5, &policy),
            AssessmentOutcome::failed(&items[1], AssessError::Transport("timeout".into())),
            AssessmentOutcome::scored(&items[2], 0.9, &policy),
            AssessmentOutcome::scored(&items[3], 0.5, &policy),
        ])
    }

    #[test]
    fn test_summary_counts() {
        let result = sample();
        let summary = result.summary();
        assert_eq!(summary.high_quality, 1);
        assert_eq!(summary.low_quality, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 4);
        assert_eq!(result.successful_calls(), 3);
        assert_eq!(result.processed_count(), 4);
    }

    #[test]
    fn test_partitions_include_errors_in_low_quality() {
        let result = sample();
        let low: Vec<usize> = result.low_quality().iter().map(|o| o.work_item_id).collect();
        assert_eq!(low, vec![0, 1, 3]);
        let high: Vec<usize> = result.high_quality().iter().map(|o| o.work_item_id).collect();
        assert_eq!(high, vec![2]);
    }

    #[test]
    fn test_sorted_by_score_is_stable_and_non_mutating() {
        let result = sample();
        let order: Vec<usize> = result.sorted_by_score().iter().map(|o| o.work_item_id).collect();
        // 0.9 在前，两个 0.5 保持原相对顺序，失败的排最后
        assert_eq!(order, vec![2, 0, 3, 1]);
        let canonical: Vec<usize> = result.outcomes.iter().map(|o| o.work_item_id).collect();
        assert_eq!(canonical, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_usage_report_counts_cancelled_as_processed_only() {
        let mut result = sample();
        let item = WorkItem::url(4, "https://x/e.jpg");
        result.outcomes.push(AssessmentOutcome::failed(&item, AssessError::Cancelled));

        let report = result.usage_report(UsageSource::Spreadsheet);
        assert_eq!(report.successful_calls, 3);
        assert_eq!(report.items_processed, 5);
        assert_eq!(report.source, UsageSource::Spreadsheet);
    }
}
