//! 评估报告
//!
//! 把一次批量评估的结果写成 JSON 文件，供后续查看或导入其它工具。

use crate::error::{AppError, AppResult};
use crate::models::{AssessmentOutcome, BatchResult, BatchSummary, UsageRecord};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct QualityReport<'a> {
    /// 本地时间，格式 `%Y-%m-%d %H:%M:%S`
    pub generated_at: String,
    pub threshold: f64,
    pub summary: BatchSummary,
    /// 按分数从高到低
    pub outcomes: Vec<&'a AssessmentOutcome>,
    #[serde(skip_serializing_if = "no_entries")]
    pub invalid_entries: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<&'a UsageRecord>,
}

fn no_entries(entries: &&[String]) -> bool {
    entries.is_empty()
}

impl<'a> QualityReport<'a> {
    pub fn new(
        result: &'a BatchResult,
        threshold: f64,
        invalid_entries: &'a [String],
        usage: Option<&'a UsageRecord>,
    ) -> Self {
        Self {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            threshold,
            summary: result.summary(),
            outcomes: result.sorted_by_score(),
            invalid_entries,
            usage,
        }
    }

    pub fn write_to(&self, path: &Path) -> AppResult<()> {
        let path_str = path.display().to_string();
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::file(&path_str, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(path, json).map_err(|e| AppError::file(path_str, e))?;
        Ok(())
    }
}
