//! 单张图片的评估结果与质量判定

use crate::error::AssessError;
use crate::models::work_item::WorkItem;
use serde::{Deserialize, Serialize};

/// 质量判定规则
///
/// 阈值来自配置，不同版本的业务取值不同（0.2 / 0.8 / 0.82）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityPolicy {
    pub threshold: f64,
}

impl QualityPolicy {
    pub const DEFAULT_THRESHOLD: f64 = 0.82;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// 有分数且分数 >= 阈值才算高质量
    pub fn is_high_quality(&self, score: Option<f64>) -> bool {
        matches!(score, Some(score) if score >= self.threshold)
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

/// 单张图片的评估结果
///
/// 完成后 `score` 与 `error` 恰好有一个存在。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentOutcome {
    pub work_item_id: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub score: Option<f64>,
    pub is_high_quality: bool,
    pub error: Option<AssessError>,
}

impl AssessmentOutcome {
    /// 评估成功
    pub fn scored(item: &WorkItem, score: f64, policy: &QualityPolicy) -> Self {
        Self {
            work_item_id: item.id,
            name: item.name(),
            url: item.source_url().map(str::to_string),
            score: Some(score),
            is_high_quality: policy.is_high_quality(Some(score)),
            error: None,
        }
    }

    /// 评估失败，一律视为低质量
    pub fn failed(item: &WorkItem, error: AssessError) -> Self {
        Self {
            work_item_id: item.id,
            name: item.name(),
            url: item.source_url().map(str::to_string),
            score: None,
            is_high_quality: false,
            error: Some(error),
        }
    }

    /// 是否拿到了数值分数
    pub fn is_success(&self) -> bool {
        self.score.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(AssessError::Cancelled))
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let policy = QualityPolicy::new(0.82);
        assert!(policy.is_high_quality(Some(0.82)));
        assert!(!policy.is_high_quality(Some(0.819999)));
        assert!(policy.is_high_quality(Some(1.0)));
        assert!(!policy.is_high_quality(None));
    }

    #[test]
    fn test_failed_outcome_is_low_quality() {
        let item = WorkItem::url(0, "https://example.com/a.jpg");
        let outcome = AssessmentOutcome::failed(&item, AssessError::MissingScore);
        assert!(!outcome.is_high_quality);
        assert!(outcome.score.is_none());
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.error_message().unwrap(),
            "评分服务响应中缺少质量分数"
        );
    }

    #[test]
    fn test_scored_outcome_uses_policy() {
        let item = WorkItem::url(3, "https://example.com/b.jpg");
        let policy = QualityPolicy::new(0.5);
        let outcome = AssessmentOutcome::scored(&item, 0.6, &policy);
        assert_eq!(outcome.work_item_id, 3);
        assert_eq!(outcome.name, "b.jpg");
        assert!(outcome.is_high_quality);
        assert!(outcome.error.is_none());
    }
}
