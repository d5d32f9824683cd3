//! 表头超链接解析策略
//!
//! 遍历所有工作表：第一行非空行作为表头，表头包含指定文字（不区分大小写）的列
//! 视为图片列，读取这些列中单元格的超链接地址（而不是单元格文字）。
//!
//! calamine 只提供单元格的值，超链接需要直接读取 xlsx 包里的 XML：
//! `xl/workbook.xml` → 工作表路径，`xl/worksheets/_rels/sheetN.xml.rels` → 链接目标。

use super::{cell_text, is_valid_url, open_workbook, sheet_range, ParsedSheet, SpreadsheetParser};
use crate::error::SpreadsheetError;
use calamine::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Cursor, Read};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

pub const DEFAULT_HEADER_SUBSTRING: &str = "Place";

#[derive(Debug, Clone)]
pub struct HeaderLinkParser {
    header_substring: String,
}

impl Default for HeaderLinkParser {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_SUBSTRING)
    }
}

impl HeaderLinkParser {
    pub fn new(header_substring: impl Into<String>) -> Self {
        Self {
            header_substring: header_substring.into(),
        }
    }

    pub fn header_substring(&self) -> &str {
        &self.header_substring
    }
}

impl SpreadsheetParser for HeaderLinkParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedSheet, SpreadsheetError> {
        let mut workbook = open_workbook(bytes)?;
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(SpreadsheetError::NoSheets);
        }

        let mut package = ZipArchive::new(Cursor::new(bytes)).map_err(malformed)?;
        let sheet_paths = sheet_paths(&mut package)?;
        let needle = self.header_substring.to_lowercase();

        let mut parsed = ParsedSheet::default();
        let mut matching_columns_found = 0usize;

        for sheet_name in &sheet_names {
            let range = sheet_range(&mut workbook, sheet_name)?;
            let (Some((start_row, start_col)), Some((end_row, end_col))) = (range.start(), range.end())
            else {
                debug!("工作表 {} 为空，跳过", sheet_name);
                continue;
            };

            let Some(header_row) = (start_row..=end_row).find(|&row| {
                (start_col..=end_col).any(|col| !cell_text(range.get_value((row, col))).is_empty())
            }) else {
                debug!("工作表 {} 没有表头行，跳过", sheet_name);
                continue;
            };

            let columns: Vec<u32> = (start_col..=end_col)
                .filter(|&col| {
                    cell_text(range.get_value((header_row, col)))
                        .to_lowercase()
                        .contains(&needle)
                })
                .collect();

            if columns.is_empty() {
                debug!("工作表 {} 没有包含 \"{}\" 的列", sheet_name, self.header_substring);
                continue;
            }
            matching_columns_found += columns.len();
            debug!(
                "工作表 {}: 表头在第 {} 行, 匹配列 {:?}",
                sheet_name,
                header_row + 1,
                columns
            );

            let Some(sheet_path) = sheet_paths.get(sheet_name) else {
                debug!("工作表 {} 在包内没有对应的 XML，跳过超链接", sheet_name);
                continue;
            };

            let mut links: Vec<((u32, u32), String)> = sheet_hyperlinks(&mut package, sheet_path)?
                .into_iter()
                .filter(|((row, col), _)| *row > header_row && columns.contains(col))
                .collect();
            links.sort_by_key(|(position, _)| *position);

            for ((row, _), target) in links {
                let url = target.trim();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    parsed.invalid_entries.push(format!(
                        "工作表 \"{}\", 第 {} 行: URL 必须以 http:// 或 https:// 开头 - {}",
                        sheet_name,
                        row + 1,
                        url
                    ));
                } else if is_valid_url(url) {
                    parsed.urls.push(url.to_string());
                } else {
                    parsed.invalid_entries.push(format!(
                        "工作表 \"{}\", 第 {} 行: URL 格式无效 - {}",
                        sheet_name,
                        row + 1,
                        url
                    ));
                }
            }
        }

        if matching_columns_found == 0 {
            return Err(SpreadsheetError::NoMatchingColumns {
                substring: self.header_substring.clone(),
            });
        }
        if parsed.total_entries() == 0 {
            return Err(SpreadsheetError::NoLinksFound {
                substring: self.header_substring.clone(),
            });
        }

        info!(
            "✓ 表格解析完成: 匹配列 {} 个, 有效链接 {} 个, 无效 {} 个",
            matching_columns_found,
            parsed.urls.len(),
            parsed.invalid_entries.len()
        );

        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "header-link"
    }
}

fn malformed(err: impl Display) -> SpreadsheetError {
    SpreadsheetError::Malformed(err.to_string())
}

/// 读取包内文件，不存在时返回 None
fn read_entry(
    package: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, SpreadsheetError> {
    let mut file = match package.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(malformed(e)),
    };
    let mut content = String::new();
    file.read_to_string(&mut content).map_err(malformed)?;
    Ok(Some(content))
}

fn attribute(element: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>, SpreadsheetError> {
    for attr in element.attributes() {
        let attr = attr.map_err(malformed)?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value().map_err(malformed)?.into_owned()));
        }
    }
    Ok(None)
}

/// 遍历 XML 中所有名为 `tag` 的元素
fn for_each_element<F>(xml: &str, tag: &[u8], mut visit: F) -> Result<(), SpreadsheetError>
where
    F: FnMut(&BytesStart<'_>) -> Result<(), SpreadsheetError>,
{
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(element) | Event::Empty(element) if element.local_name().as_ref() == tag => {
                visit(&element)?;
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// 关系文件：Id → Target
fn relationships(xml: &str) -> Result<HashMap<String, String>, SpreadsheetError> {
    let mut map = HashMap::new();
    for_each_element(xml, b"Relationship", |element| {
        if let (Some(id), Some(target)) = (attribute(element, b"Id")?, attribute(element, b"Target")?) {
            map.insert(id, target);
        }
        Ok(())
    })?;
    Ok(map)
}

/// 工作表名 → 包内 XML 路径
fn sheet_paths(
    package: &mut ZipArchive<Cursor<&[u8]>>,
) -> Result<HashMap<String, String>, SpreadsheetError> {
    let (Some(workbook), Some(rels)) = (
        read_entry(package, "xl/workbook.xml")?,
        read_entry(package, "xl/_rels/workbook.xml.rels")?,
    ) else {
        return Ok(HashMap::new());
    };
    let rels = relationships(&rels)?;

    let mut paths = HashMap::new();
    for_each_element(&workbook, b"sheet", |element| {
        if let (Some(name), Some(rel_id)) = (attribute(element, b"name")?, attribute(element, b"id")?) {
            if let Some(target) = rels.get(&rel_id) {
                let path = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                };
                paths.insert(name, path);
            }
        }
        Ok(())
    })?;
    Ok(paths)
}

/// 某个工作表中所有超链接：(行, 列) → 链接目标，行列从 0 开始
fn sheet_hyperlinks(
    package: &mut ZipArchive<Cursor<&[u8]>>,
    sheet_path: &str,
) -> Result<Vec<((u32, u32), String)>, SpreadsheetError> {
    let Some(sheet_xml) = read_entry(package, sheet_path)? else {
        return Ok(Vec::new());
    };

    let rels_path = match sheet_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", sheet_path),
    };
    let rels = match read_entry(package, &rels_path)? {
        Some(xml) => relationships(&xml)?,
        None => HashMap::new(),
    };

    let mut links = Vec::new();
    for_each_element(&sheet_xml, b"hyperlink", |element| {
        let Some(position) = attribute(element, b"ref")?.as_deref().and_then(parse_cell_ref) else {
            return Ok(());
        };
        let target = match attribute(element, b"id")? {
            Some(rel_id) => rels.get(&rel_id).cloned(),
            None => attribute(element, b"location")?,
        };
        if let Some(target) = target {
            links.push((position, target));
        }
        Ok(())
    })?;
    Ok(links)
}

/// "B12" → (11, 1)；区域引用 "B12:C13" 取左上角
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let cell_ref = cell_ref.split(':').next()?.trim();
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut col = 0u32;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col.checked_sub(1)?))
}
