//! 用量统计数据

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 图片来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageSource {
    File,
    Spreadsheet,
}

impl UsageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageSource::File => "file",
            UsageSource::Spreadsheet => "spreadsheet",
        }
    }
}

/// 一个批次结束后交给用量统计的三个数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    /// 拿到数值分数的调用次数（只算成功）
    pub successful_calls: u64,
    /// 处理过的图片数（成功 + 失败）
    pub items_processed: u64,
    pub source: UsageSource,
}

/// 用量历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub api_calls_used: u64,
    pub items_processed: u64,
    pub source: UsageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// 累计用量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_api_calls: u64,
    pub total_items_processed: u64,
    pub last_reset: DateTime<Utc>,
    pub monthly_limit: u64,
}

impl UsageStats {
    pub fn new(monthly_limit: u64) -> Self {
        Self {
            total_api_calls: 0,
            total_items_processed: 0,
            last_reset: Utc::now(),
            monthly_limit,
        }
    }

    pub fn remaining_calls(&self) -> u64 {
        self.monthly_limit.saturating_sub(self.total_api_calls)
    }
}
