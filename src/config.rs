use crate::error::{AppResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 每批同时发出的评估请求数量
    pub max_concurrent_requests: usize,
    /// 高质量阈值（分数 >= 阈值即为高质量）
    pub quality_threshold: f64,
    /// 单个请求超时（秒）
    pub request_timeout_secs: u64,
    /// 评分服务地址
    pub api_endpoint: String,
    /// 单个文件大小上限（字节）
    pub max_file_size_bytes: usize,
    /// 凭据文件
    pub credentials_file: String,
    /// 用量统计文件
    pub usage_file: String,
    /// 每月调用上限（用量统计首次创建时使用）
    pub monthly_limit: u64,
    /// 评估报告输出文件
    pub output_report_file: String,
    /// 高质量图片打包文件
    pub archive_file: String,
    /// 超链接解析模式下，表头需要包含的文字
    pub header_substring: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            quality_threshold: 0.82,
            request_timeout_secs: 30,
            api_endpoint: "https://api.sightengine.com/1.0/check.json".to_string(),
            max_file_size_bytes: 10 * 1024 * 1024,
            credentials_file: "credentials.json".to_string(),
            usage_file: "usage.json".to_string(),
            monthly_limit: 1000,
            output_report_file: "quality_report.json".to_string(),
            archive_file: "high-quality-images.zip".to_string(),
            header_substring: "Place".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(config)
    }

    /// 加载配置：TOML 文件（可选）→ 环境变量覆盖 → 校验
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        let current = self;
        Self {
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.max_concurrent_requests),
            quality_threshold: std::env::var("QUALITY_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(current.quality_threshold),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.request_timeout_secs),
            api_endpoint: std::env::var("SIGHTENGINE_API_ENDPOINT").unwrap_or(current.api_endpoint),
            max_file_size_bytes: std::env::var("MAX_FILE_SIZE_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(current.max_file_size_bytes),
            credentials_file: std::env::var("CREDENTIALS_FILE").unwrap_or(current.credentials_file),
            usage_file: std::env::var("USAGE_FILE").unwrap_or(current.usage_file),
            monthly_limit: std::env::var("MONTHLY_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(current.monthly_limit),
            output_report_file: std::env::var("OUTPUT_REPORT_FILE").unwrap_or(current.output_report_file),
            archive_file: std::env::var("ARCHIVE_FILE").unwrap_or(current.archive_file),
            header_substring: std::env::var("HEADER_SUBSTRING").unwrap_or(current.header_substring),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(current.verbose_logging),
        }
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid(
                "max_concurrent_requests",
                "并发数必须为正整数",
            ));
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(ConfigError::invalid(
                "quality_threshold",
                format!("阈值必须在 [0, 1] 之间，当前为 {}", self.quality_threshold),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "超时时间必须大于 0"));
        }
        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::invalid("max_file_size_bytes", "文件大小上限必须大于 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_requests, 10);
        assert_eq!(config.quality_threshold, 0.82);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_toml_partial_overrides_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "quality_threshold = 0.8\nmax_concurrent_requests = 4").unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.quality_threshold, 0.8);
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.header_substring, "Place");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = Config {
            max_concurrent_requests: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "max_concurrent_requests"
        ));

        let config = Config {
            quality_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "quality_threshold = \"high\"").unwrap();

        let err = Config::from_toml_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }
}
