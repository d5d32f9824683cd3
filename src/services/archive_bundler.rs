//! 打包下载服务 - 业务能力层
//!
//! 把高质量图片打成一个 zip：
//! - 条目命名为 `Image N.ext`，N 为在打包列表中的序号（从 1 开始）
//! - URL 图片按每批 10 个并发下载，整批完成后再开始下一批
//! - 下载失败的图片写入 `Image N_FAILED.txt` 占位说明，不影响其它条目
//! - DEFLATE 压缩，级别 6

use crate::error::ArchiveError;
use crate::models::{Payload, WorkItem};
use crate::orchestrator::windowed::{Settled, WindowedExecutor};
use async_trait::async_trait;
use regex::Regex;
use std::io::{Cursor, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 下载并发批大小
pub const DOWNLOAD_BATCH_SIZE: usize = 10;

/// 压缩级别
pub const COMPRESSION_LEVEL: i64 = 6;

const DEFAULT_EXTENSION: &str = "jpg";

/// 条目内容来源
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveSource {
    /// 已在内存中的文件内容
    Bytes(Vec<u8>),
    /// 需要下载的远程图片
    Url(String),
}

/// 待打包的一张图片
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveItem {
    pub name: String,
    pub source: ArchiveSource,
}

impl ArchiveItem {
    pub fn from_work_item(item: &WorkItem) -> Self {
        let source = match &item.payload {
            Payload::File { bytes, .. } => ArchiveSource::Bytes(bytes.clone()),
            Payload::Url { url } => ArchiveSource::Url(url.clone()),
        };
        Self {
            name: item.name(),
            source,
        }
    }

    fn url(&self) -> Option<&str> {
        match &self.source {
            ArchiveSource::Url(url) => Some(url),
            ArchiveSource::Bytes(_) => None,
        }
    }

    /// 条目扩展名：先看名称，再看 URL 路径，最后默认 jpg
    pub fn extension(&self) -> String {
        extension_of(&self.name)
            .or_else(|| {
                self.url()
                    .and_then(|url| url::Url::parse(url).ok())
                    .and_then(|url| extension_of(url.path()))
            })
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

fn extension_regex() -> Option<&'static Regex> {
    static EXTENSION: OnceLock<Option<Regex>> = OnceLock::new();
    EXTENSION
        .get_or_init(|| Regex::new(r"\.([^./]+)$").ok())
        .as_ref()
}

fn extension_of(name: &str) -> Option<String> {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    extension_regex()?
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// 打包器
#[async_trait]
pub trait ArchiveBundler: Send + Sync {
    /// 返回 zip 文件字节
    async fn bundle(&self, items: &[ArchiveItem]) -> Result<Vec<u8>, ArchiveError>;
}

/// 基于 reqwest 下载、zip 压缩的打包器
pub struct ZipBundler {
    client: reqwest::Client,
    executor: WindowedExecutor,
    timeout: Duration,
}

impl ZipBundler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            executor: WindowedExecutor::new(DOWNLOAD_BATCH_SIZE),
            timeout,
        }
    }

    async fn fetch(&self, item: &ArchiveItem) -> Result<Vec<u8>, String> {
        let url = match &item.source {
            ArchiveSource::Bytes(bytes) => return Ok(bytes.clone()),
            ArchiveSource::Url(url) => url,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("请求失败: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("下载失败: HTTP {}", status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("读取响应失败: {}", e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ArchiveBundler for ZipBundler {
    async fn bundle(&self, items: &[ArchiveItem]) -> Result<Vec<u8>, ArchiveError> {
        if items.is_empty() {
            return Err(ArchiveError::Empty);
        }
        info!("📦 开始打包 {} 张图片", items.len());

        let downloads = self
            .executor
            .run(
                items,
                None,
                |_, item| self.fetch(item),
                |index, settled| {
                    if let Settled::Completed(Err(e)) = settled {
                        warn!("[图片 {}] 下载失败: {}", index + 1, e);
                    }
                },
            )
            .await;

        let entries = items.iter().zip(downloads).map(|(item, settled)| {
            let content = match settled {
                Settled::Completed(result) => result,
                Settled::Panicked(message) => Err(message),
                Settled::Skipped => Err("未执行".to_string()),
            };
            (item, content)
        });

        write_zip(entries)
    }
}

/// 按顺序写入 zip，失败项写占位说明
fn write_zip<'a, I>(entries: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = (&'a ArchiveItem, Result<Vec<u8>, String>)>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut added = 0usize;
    let mut failed = 0usize;

    for (index, (item, content)) in entries.into_iter().enumerate() {
        let number = index + 1;
        match content {
            Ok(bytes) => {
                let file_name = format!("Image {}.{}", number, item.extension());
                writer.start_file(file_name.as_str(), options)?;
                writer.write_all(&bytes)?;
                debug!("已加入 {}", file_name);
                added += 1;
            }
            Err(reason) => {
                writer.start_file(format!("Image {}_FAILED.txt", number), options)?;
                writeln!(writer, "下载失败: {}", item.name)?;
                writeln!(writer, "错误: {}", reason)?;
                write!(writer, "原始 URL: {}", item.url().unwrap_or("N/A"))?;
                failed += 1;
            }
        }
    }

    let archive = writer.finish()?.into_inner();
    info!(
        "✓ 打包完成: 成功 {}, 失败 {}, 大小 {:.2}MB",
        added,
        failed,
        archive.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(archive)
}
