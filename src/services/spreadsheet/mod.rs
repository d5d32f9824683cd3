//! 表格解析 - 业务能力层
//!
//! 从表格中提取图片 URL。两种策略输出相同的 [`ParsedSheet`]，可以互换：
//! - [`FirstColumnParser`]：第一个工作表 A 列的单元格文字
//! - [`HeaderLinkParser`]：所有工作表中表头包含指定文字的列里的超链接地址

pub mod first_column;
pub mod header_link;

pub use first_column::FirstColumnParser;
pub use header_link::HeaderLinkParser;

use crate::error::SpreadsheetError;
use calamine::{Data, Range, Reader, Sheets};
use serde::Serialize;
use std::io::Cursor;

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedSheet {
    /// 有效 URL，保持表格中的顺序与重复项
    pub urls: Vec<String>,
    /// 被拒绝的行及原因
    pub invalid_entries: Vec<String>,
}

impl ParsedSheet {
    pub fn total_entries(&self) -> usize {
        self.urls.len() + self.invalid_entries.len()
    }
}

/// 表格解析策略
pub trait SpreadsheetParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedSheet, SpreadsheetError>;

    /// 策略名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 打开工作簿（自动识别 xlsx / xls / ods）
pub(crate) fn open_workbook(bytes: &[u8]) -> Result<Sheets<Cursor<Vec<u8>>>, SpreadsheetError> {
    calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SpreadsheetError::OpenFailed(e.to_string()))
}

/// 读取指定工作表的数据区域
pub(crate) fn sheet_range(
    workbook: &mut Sheets<Cursor<Vec<u8>>>,
    sheet_name: &str,
) -> Result<Range<Data>, SpreadsheetError> {
    workbook
        .worksheet_range(sheet_name)
        .map_err(|e| SpreadsheetError::OpenFailed(format!("工作表 {}: {}", sheet_name, e)))
}

/// 单元格文字（去掉首尾空白）
pub(crate) fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

pub(crate) fn is_valid_url(url: &str) -> bool {
    url::Url::parse(url).is_ok()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! 用最小的 OOXML 结构在内存中拼出 xlsx 文件

    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// 一个工作表：单元格文字 + 超链接
    pub struct SheetFixture<'a> {
        pub name: &'a str,
        /// (单元格引用, 文字)，例如 ("A1", "Place")
        pub cells: Vec<(&'a str, &'a str)>,
        /// (单元格引用, 链接地址)
        pub links: Vec<(&'a str, &'a str)>,
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

    fn row_of(cell_ref: &str) -> u32 {
        cell_ref
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse()
            .unwrap()
    }

    fn sheet_xml(sheet: &SheetFixture<'_>) -> String {
        let mut rows: Vec<u32> = sheet.cells.iter().map(|(r, _)| row_of(r)).collect();
        rows.sort_unstable();
        rows.dedup();

        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheetData>"#,
        );
        for row in rows {
            xml.push_str(&format!(r#"<row r="{}">"#, row));
            for (cell_ref, text) in sheet.cells.iter().filter(|(r, _)| row_of(r) == row) {
                xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    cell_ref,
                    escape(text)
                ));
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
        if !sheet.links.is_empty() {
            xml.push_str("<hyperlinks>");
            for (i, (cell_ref, _)) in sheet.links.iter().enumerate() {
                xml.push_str(&format!(r#"<hyperlink ref="{}" r:id="rIdLink{}"/>"#, cell_ref, i + 1));
            }
            xml.push_str("</hyperlinks>");
        }
        xml.push_str("</worksheet>");
        xml
    }

    fn sheet_rels_xml(sheet: &SheetFixture<'_>) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, (_, target)) in sheet.links.iter().enumerate() {
            xml.push_str(&format!(
                r#"<Relationship Id="rIdLink{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="{}" TargetMode="External"/>"#,
                i + 1,
                escape(target)
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    /// 生成 xlsx 字节
    pub fn build_xlsx(sheets: &[SheetFixture<'_>]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        let mut content_types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        for i in 1..=sheets.len() {
            content_types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i
            ));
        }
        content_types.push_str("</Types>");

        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut workbook_rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, sheet) in sheets.iter().enumerate() {
            workbook.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape(sheet.name),
                i + 1,
                i + 1
            ));
            workbook_rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }
        workbook.push_str("</sheets></workbook>");
        workbook_rels.push_str("</Relationships>");

        let mut files: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_string(), content_types),
            (
                "_rels/.rels".to_string(),
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/workbook.xml".to_string(), workbook),
            ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
        ];
        for (i, sheet) in sheets.iter().enumerate() {
            files.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(sheet)));
            if !sheet.links.is_empty() {
                files.push((
                    format!("xl/worksheets/_rels/sheet{}.xml.rels", i + 1),
                    sheet_rels_xml(sheet),
                ));
            }
        }

        for (name, content) in files {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
