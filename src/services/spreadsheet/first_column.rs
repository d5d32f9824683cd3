//! 第一列解析策略
//!
//! 读取第一个工作表 A 列的文字，只接受指向 .jpg / .jpeg 的合法 URL。

use super::{cell_text, is_valid_url, open_workbook, sheet_range, ParsedSheet, SpreadsheetParser};
use crate::error::SpreadsheetError;
use calamine::Reader;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstColumnParser;

impl FirstColumnParser {
    pub fn new() -> Self {
        Self
    }
}

impl SpreadsheetParser for FirstColumnParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedSheet, SpreadsheetError> {
        let mut workbook = open_workbook(bytes)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SpreadsheetError::NoSheets)?;
        debug!("使用工作表: {}", sheet_name);

        let range = sheet_range(&mut workbook, &sheet_name)?;
        let mut parsed = ParsedSheet::default();

        let (Some((start_row, _)), Some((end_row, _))) = (range.start(), range.end()) else {
            info!("工作表 {} 为空", sheet_name);
            return Ok(parsed);
        };

        for row in start_row..=end_row {
            let url = cell_text(range.get_value((row, 0)));
            if url.is_empty() {
                continue;
            }

            let lower = url.to_lowercase();
            if !(lower.ends_with(".jpg") || lower.ends_with(".jpeg")) {
                debug!("第 {} 行不是 .jpg 文件: {}", row + 1, url);
                parsed
                    .invalid_entries
                    .push(format!("第 {} 行: 不是 .jpg 文件 - {}", row + 1, url));
                continue;
            }

            if is_valid_url(&url) {
                parsed.urls.push(url);
            } else {
                debug!("第 {} 行 URL 格式无效: {}", row + 1, url);
                parsed
                    .invalid_entries
                    .push(format!("第 {} 行: URL 格式无效 - {}", row + 1, url));
            }
        }

        info!(
            "✓ 表格解析完成: 有效 URL {} 个, 无效 {} 个",
            parsed.urls.len(),
            parsed.invalid_entries.len()
        );

        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "first-column"
    }
}
