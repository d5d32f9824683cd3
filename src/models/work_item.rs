//! 待评估的图片

/// 图片来源
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 直接上传的文件
    File {
        bytes: Vec<u8>,
        mime_type: String,
        name: String,
    },
    /// 表格中提取的图片链接
    Url { url: String },
}

/// 一张待评估的图片
///
/// `id` 即输入列表中的下标，调度器依靠它把结果放回原来的位置。
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: usize,
    pub payload: Payload,
}

impl WorkItem {
    pub fn file(
        id: usize,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            id,
            payload: Payload::File {
                bytes,
                mime_type: mime_type.into(),
                name: name.into(),
            },
        }
    }

    pub fn url(id: usize, url: impl Into<String>) -> Self {
        Self {
            id,
            payload: Payload::Url { url: url.into() },
        }
    }

    /// 按顺序为一组 URL 分配下标
    pub fn from_urls<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(id, url)| Self::url(id, url))
            .collect()
    }

    /// 显示名称：文件名，或 URL 最后一段路径
    pub fn name(&self) -> String {
        match &self.payload {
            Payload::File { name, .. } => name.clone(),
            Payload::Url { url } => url
                .split('/')
                .next_back()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("image-{}.jpg", self.id + 1)),
        }
    }

    /// URL 类图片返回原始链接
    pub fn source_url(&self) -> Option<&str> {
        match &self.payload {
            Payload::Url { url } => Some(url),
            Payload::File { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_urls_assigns_indices_in_order() {
        let items = WorkItem::from_urls(["https://a/1.jpg", "https://a/2.jpg", "https://a/1.jpg"]);
        let ids: Vec<usize> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(items[2].source_url(), Some("https://a/1.jpg"));
    }

    #[test]
    fn test_name_from_url() {
        assert_eq!(WorkItem::url(0, "https://cdn.example.com/p/cat.jpg").name(), "cat.jpg");
        assert_eq!(WorkItem::url(4, "https://cdn.example.com/p/").name(), "image-5.jpg");
        assert_eq!(WorkItem::file(0, "dog.png", "image/png", vec![]).name(), "dog.png");
    }
}
