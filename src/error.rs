use serde::Serialize;
use thiserror::Error;

/// 单张图片的评估错误
///
/// 所有变体都只作用于当前图片：调度器会把它们转换成
/// `AssessmentOutcome.error`，然后继续处理批次中的其他图片。
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum AssessError {
    /// 请求发出前的校验失败（大小、类型、URL 格式）
    #[error("校验失败: {0}")]
    Validation(String),
    /// 网络不可达、超时等传输层错误
    #[error("网络错误: {0}")]
    Transport(String),
    /// 评分服务返回非成功状态或无法解析的响应
    #[error("评分服务错误: {0}")]
    Service(String),
    /// 状态成功但响应中没有数值型质量分数
    #[error("评分服务响应中缺少质量分数")]
    MissingScore,
    /// 未配置 API 凭据
    #[error("未找到 API 凭据，请先设置 Sightengine API 凭据")]
    Credential,
    /// 批次在该图片派发前被取消
    #[error("批次已取消，图片未提交评估")]
    Cancelled,
    /// 评估任务异常终止（panic）
    #[error("评估任务异常终止: {0}")]
    Internal(String),
}

impl AssessError {
    /// 是否在发出网络请求之前就失败了
    pub fn is_pre_request(&self) -> bool {
        matches!(
            self,
            AssessError::Validation(_) | AssessError::Credential | AssessError::Cancelled
        )
    }
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 表格解析错误（批次级，调度开始前报告）
    #[error("表格解析错误: {0}")]
    Spreadsheet(#[from] SpreadsheetError),
    /// 解析后没有可用的图片（批次级）
    #[error("没有找到有效的图片: {0}")]
    NoUsableItems(String),
    /// 凭据 / 用量存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 打包下载错误
    #[error("打包错误: {0}")]
    Archive(#[from] ArchiveError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 表格解析错误
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// 无法打开工作簿
    #[error("无法读取表格文件: {0}")]
    OpenFailed(String),
    /// 工作簿中没有工作表
    #[error("表格中没有工作表")]
    NoSheets,
    /// 工作表内部 XML 结构异常
    #[error("表格结构异常: {0}")]
    Malformed(String),
    /// 没有任何表头包含指定文字的列
    #[error("没有找到表头包含 '{substring}' 的列")]
    NoMatchingColumns { substring: String },
    /// 匹配列中没有任何超链接
    #[error("'{substring}' 列中没有检测到图片链接")]
    NoLinksFound { substring: String },
}

/// 本地存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读写文件失败
    #[error("读写文件失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 序列化 / 反序列化失败
    #[error("JSON 处理失败 ({path}): {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML 解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: String, reason: String },
}

/// 打包下载错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 没有可打包的图片
    #[error("没有可打包的高质量图片")]
    Empty,
    /// 写入 zip 失败
    #[error("写入 zip 失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }

    /// 创建"没有可用图片"错误
    pub fn no_usable_items(reason: impl Into<String>) -> Self {
        AppError::NoUsableItems(reason.into())
    }
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<String>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
