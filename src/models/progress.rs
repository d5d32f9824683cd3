//! 处理进度

use serde::Serialize;

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingPhase {
    /// 正在解析表格
    Parsing,
    /// 正在评估图片
    Processing,
}

/// 处理进度
///
/// 同一批次内 `completed_count` 单调不减。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingProgress {
    pub phase: ProcessingPhase,
    pub total_items: usize,
    pub completed_count: usize,
}

impl ProcessingProgress {
    pub fn processing(total_items: usize) -> Self {
        Self {
            phase: ProcessingPhase::Processing,
            total_items,
            completed_count: 0,
        }
    }

    /// 一张图片完成
    pub fn advance(&mut self) {
        self.completed_count = (self.completed_count + 1).min(self.total_items);
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ProcessingPhase::Processing && self.completed_count == self.total_items
    }

    pub fn percent(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.completed_count as f64 * 100.0 / self.total_items as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_never_exceeds_total() {
        let mut progress = ProcessingProgress::processing(2);
        progress.advance();
        assert_eq!(progress.percent(), 50.0);
        progress.advance();
        progress.advance();
        assert_eq!(progress.completed_count, 2);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_phase_serialized_lowercase() {
        assert_eq!(serde_json::to_value(ProcessingPhase::Parsing).unwrap(), "parsing");
        let json = serde_json::to_value(ProcessingProgress::processing(3)).unwrap();
        assert_eq!(json["phase"], "processing");
        assert_eq!(json["total_items"], 3);
    }
}
