//! 用量统计服务 - 业务能力层
//!
//! 记录每个批次消耗的 API 调用次数，维护每月上限与最近 100 条历史。

use crate::error::{AppResult, StoreError};
use crate::models::usage::{UsageRecord, UsageReport, UsageStats};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// 历史记录保留条数
pub const HISTORY_LIMIT: usize = 100;

/// 达到上限的该比例时提示"即将用完"
const APPROACHING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsageState {
    stats: UsageStats,
    /// 最新的在前
    #[serde(default)]
    history: Vec<UsageRecord>,
}

/// 用量统计
///
/// 由调用方创建并注入，不使用全局单例。`path` 为空时只保存在内存中。
pub struct UsageTracker {
    path: Option<PathBuf>,
    state: Mutex<UsageState>,
}

impl UsageTracker {
    /// 只在内存中统计
    pub fn in_memory(monthly_limit: u64) -> Self {
        Self {
            path: None,
            state: Mutex::new(UsageState {
                stats: UsageStats::new(monthly_limit),
                history: Vec::new(),
            }),
        }
    }

    /// 打开 JSON 文件，不存在时使用默认上限新建
    pub fn open(path: impl Into<PathBuf>, default_monthly_limit: u64) -> AppResult<Self> {
        let path = path.into();
        let path_str = path.display().to_string();

        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::json(&path_str, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("用量文件不存在，新建: {}", path_str);
                UsageState {
                    stats: UsageStats::new(default_monthly_limit),
                    history: Vec::new(),
                }
            }
            Err(e) => return Err(StoreError::io(path_str, e).into()),
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn stats(&self) -> UsageStats {
        self.state.lock().stats.clone()
    }

    pub fn history(&self) -> Vec<UsageRecord> {
        self.state.lock().history.clone()
    }

    /// 记录一个批次的用量：累加统计并追加历史
    pub fn record_batch(&self, report: &UsageReport, file_name: Option<&str>) -> AppResult<UsageRecord> {
        let record = UsageRecord {
            timestamp: Utc::now(),
            api_calls_used: report.successful_calls,
            items_processed: report.items_processed,
            source: report.source,
            file_name: file_name.map(str::to_string),
        };

        let mut state = self.state.lock();
        let mut next = state.clone();
        next.stats.total_api_calls += report.successful_calls;
        next.stats.total_items_processed += report.items_processed;
        next.history.insert(0, record.clone());
        next.history.truncate(HISTORY_LIMIT);
        // 先写文件，成功后才更新内存
        self.persist(&next)?;
        *state = next;

        info!(
            "📈 用量已记录: 调用 {} 次, 处理 {} 张 ({}), 本月累计 {}/{}",
            record.api_calls_used,
            record.items_processed,
            record.source.as_str(),
            state.stats.total_api_calls,
            state.stats.monthly_limit
        );

        Ok(record)
    }

    /// 清零本月用量
    pub fn reset_monthly(&self) -> AppResult<()> {
        self.commit(|next| {
            next.stats.total_api_calls = 0;
            next.stats.total_items_processed = 0;
            next.stats.last_reset = Utc::now();
        })
    }

    pub fn set_monthly_limit(&self, limit: u64) -> AppResult<()> {
        self.commit(|next| next.stats.monthly_limit = limit)
    }

    pub fn clear_history(&self) -> AppResult<()> {
        self.commit(|next| next.history.clear())
    }

    /// 已用到上限的 80%
    pub fn is_approaching_limit(&self) -> bool {
        let stats = self.stats();
        stats.total_api_calls as f64 >= stats.monthly_limit as f64 * APPROACHING_RATIO
    }

    pub fn is_limit_exceeded(&self) -> bool {
        let stats = self.stats();
        stats.total_api_calls >= stats.monthly_limit
    }

    /// 在副本上修改并写盘，写盘成功后替换内存状态
    fn commit(&self, update: impl FnOnce(&mut UsageState)) -> AppResult<()> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        update(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, state: &UsageState) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let path_str = path.display().to_string();
        let json = serde_json::to_string_pretty(state).map_err(|e| StoreError::json(&path_str, e))?;
        std::fs::write(path, json).map_err(|e| StoreError::io(path_str, e))?;
        Ok(())
    }
}
