//! 图片评估服务 - 业务能力层
//!
//! 只负责"评估一张图片"：请求前校验 → 调用评分服务 → 解释响应。
//! 不关心批次、并发和进度。

use crate::clients::scoring_client::{ApiResponse, FileUpload, ScoringApi};
use crate::config::Config;
use crate::error::AssessError;
use crate::models::work_item::{Payload, WorkItem};
use crate::services::credential_store::CredentialStore;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// 默认文件大小上限 10MB
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// 支持的文件类型
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
];

/// URL 中需要出现的图片扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"];

/// 图片评估服务
///
/// 职责：
/// - 请求前校验文件大小、类型和 URL 格式
/// - 读取注入的凭据，缺失时直接失败，不发请求
/// - 把评分服务的响应解释成分数或带类型的错误
pub struct AssessmentService {
    api: Arc<dyn ScoringApi>,
    credentials: Arc<dyn CredentialStore>,
    max_file_size: usize,
}

impl AssessmentService {
    /// 创建新的评估服务
    pub fn new(
        api: Arc<dyn ScoringApi>,
        credentials: Arc<dyn CredentialStore>,
        config: &Config,
    ) -> Self {
        Self {
            api,
            credentials,
            max_file_size: config.max_file_size_bytes,
        }
    }

    /// 评估一张图片，返回质量分数
    pub async fn assess(&self, item: &WorkItem) -> Result<f64, AssessError> {
        match &item.payload {
            Payload::File {
                bytes, mime_type, ..
            } => validate_file(mime_type, bytes.len(), self.max_file_size)?,
            Payload::Url { url } => validate_url(url)?,
        }

        let credentials = self.credentials.get().ok_or(AssessError::Credential)?;

        let response = match &item.payload {
            Payload::File {
                bytes,
                mime_type,
                name,
            } => {
                debug!("处理文件: {}, 大小: {} 字节, 类型: {}", name, bytes.len(), mime_type);
                self.api
                    .check_file(
                        FileUpload {
                            name,
                            mime_type,
                            bytes,
                        },
                        &credentials,
                    )
                    .await?
            }
            Payload::Url { url } => self.api.check_url(url, &credentials).await?,
        };

        let score = parse_check_response(&response)?;
        debug!("[图片 {}] 质量分数: {}", item.id + 1, score);
        Ok(score)
    }
}

/// 校验上传文件的大小与类型
pub fn validate_file(mime_type: &str, size: usize, max_size: usize) -> Result<(), AssessError> {
    if size > max_size {
        return Err(AssessError::Validation(format!(
            "文件过大，最大 {}MB，实际 {:.2}MB",
            max_size / 1024 / 1024,
            size as f64 / 1024.0 / 1024.0
        )));
    }

    let mime_type = mime_type.to_ascii_lowercase();
    if !SUPPORTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(AssessError::Validation(format!(
            "不支持的文件类型: {}，支持的类型: {}",
            mime_type,
            SUPPORTED_MIME_TYPES.join(", ")
        )));
    }

    Ok(())
}

/// 校验 URL 格式以及是否指向支持的图片格式
pub fn validate_url(url: &str) -> Result<(), AssessError> {
    url::Url::parse(url)
        .map_err(|_| AssessError::Validation(format!("URL 格式无效: {}", url)))?;

    let lower = url.to_lowercase();
    if !SUPPORTED_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        return Err(AssessError::Validation(format!(
            "URL 看起来不是支持的图片格式: {}",
            url
        )));
    }

    Ok(())
}

/// 解释评分服务的响应
///
/// 只有 `status == "success"` 且带有数值型 `quality.score` 才算成功。
pub fn parse_check_response(response: &ApiResponse) -> Result<f64, AssessError> {
    if !(200..300).contains(&response.status) {
        let detail = serde_json::from_str::<JsonValue>(&response.body)
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or_else(|| {
                if response.body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    response.body.clone()
                }
            });
        warn!("评分服务返回错误 - 状态: {}, 内容: {}", response.status, detail);
        return Err(AssessError::Service(format!(
            "Sightengine API 错误 ({}): {}",
            response.status, detail
        )));
    }

    let data: JsonValue = serde_json::from_str(&response.body)
        .map_err(|_| AssessError::Service("评分服务返回了无效的 JSON".to_string()))?;

    match data.get("status").and_then(JsonValue::as_str) {
        Some("success") => {}
        Some("failure") => {
            let detail = error_message(&data).unwrap_or_else(|| "API request failed".to_string());
            return Err(AssessError::Service(format!("请求失败: {}", detail)));
        }
        Some(other) => {
            return Err(AssessError::Service(format!("未知的响应状态: {}", other)));
        }
        None => {
            return Err(AssessError::Service("响应缺少 status 字段".to_string()));
        }
    }

    data.pointer("/quality/score")
        .and_then(JsonValue::as_f64)
        .ok_or(AssessError::MissingScore)
}

fn error_message(value: &JsonValue) -> Option<String> {
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockScoringApi;
    use crate::services::credential_store::{Credentials, MemoryCredentialStore};

    fn service_with(mock: &MockScoringApi, with_credentials: bool) -> AssessmentService {
        let store = if with_credentials {
            MemoryCredentialStore::with_credentials(Credentials::new("user", "secret"))
        } else {
            MemoryCredentialStore::new()
        };
        AssessmentService::new(Arc::new(mock.clone()), Arc::new(store), &Config::default())
    }

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_success() {
        let score = parse_check_response(&response(
            200,
            r#"{"status":"success","quality":{"score":0.91}}"#,
        ))
        .unwrap();
        assert_eq!(score, 0.91);

        // 整数分数也是数值
        let score = parse_check_response(&response(200, r#"{"status":"success","quality":{"score":1}}"#)).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_parse_keeps_full_score_precision() {
        for score in [0.010847735273804303, 0.8199999999999998, 0.1 + 0.2] {
            let body = serde_json::json!({"status": "success", "quality": {"score": score}}).to_string();
            assert_eq!(parse_check_response(&response(200, &body)), Ok(score), "body: {}", body);
        }
    }

    #[test]
    fn test_parse_missing_or_non_numeric_score() {
        for body in [
            r#"{"status":"success"}"#,
            r#"{"status":"success","quality":{}}"#,
            r#"{"status":"success","quality":{"score":"0.9"}}"#,
        ] {
            assert_eq!(
                parse_check_response(&response(200, body)),
                Err(AssessError::MissingScore),
                "body: {}",
                body
            );
        }
    }

    #[test]
    fn test_parse_non_success_status() {
        let err = parse_check_response(&response(
            200,
            r#"{"status":"failure","error":{"type":"usage_limit","message":"Daily usage limit reached"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err, AssessError::Service("请求失败: Daily usage limit reached".into()));

        let err = parse_check_response(&response(200, r#"{"status":"pending"}"#)).unwrap_err();
        assert!(matches!(err, AssessError::Service(msg) if msg.contains("pending")));
    }

    #[test]
    fn test_parse_http_error_and_malformed_body() {
        let err = parse_check_response(&response(401, r#"{"error":{"message":"bad secret"}}"#)).unwrap_err();
        assert_eq!(err, AssessError::Service("Sightengine API 错误 (401): bad secret".into()));

        let err = parse_check_response(&response(502, "")).unwrap_err();
        assert!(matches!(err, AssessError::Service(msg) if msg.contains("Unknown error")));

        let err = parse_check_response(&response(200, "<html>oops</html>")).unwrap_err();
        assert_eq!(err, AssessError::Service("评分服务返回了无效的 JSON".into()));
    }

    #[test]
    fn test_validate_file_rules() {
        assert!(validate_file("image/png", 1024, DEFAULT_MAX_FILE_SIZE).is_ok());
        assert!(validate_file("IMAGE/JPEG", DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILE_SIZE).is_ok());

        let err = validate_file("image/png", DEFAULT_MAX_FILE_SIZE + 1, DEFAULT_MAX_FILE_SIZE).unwrap_err();
        assert!(matches!(err, AssessError::Validation(msg) if msg.contains("10MB")));

        let err = validate_file("image/tiff", 10, DEFAULT_MAX_FILE_SIZE).unwrap_err();
        assert!(matches!(err, AssessError::Validation(msg) if msg.contains("image/tiff")));
    }

    #[test]
    fn test_validate_url_rules() {
        assert!(validate_url("https://cdn.example.com/a.JPG").is_ok());
        assert!(validate_url("https://cdn.example.com/a.webp?w=200").is_ok());
        assert!(matches!(validate_url("not a url"), Err(AssessError::Validation(_))));
        assert!(matches!(
            validate_url("https://cdn.example.com/doc.pdf"),
            Err(AssessError::Validation(msg)) if msg.contains("不是支持的图片格式")
        ));
    }

    #[tokio::test]
    async fn test_oversized_file_never_reaches_network() {
        let mock = MockScoringApi::new();
        mock.respond_score("huge.jpg", 0.99);
        let service = service_with(&mock, true);

        let item = WorkItem::file(0, "huge.jpg", "image/jpeg", vec![0u8; DEFAULT_MAX_FILE_SIZE + 1]);
        let err = service.assess(&item).await.unwrap_err();

        assert!(matches!(err, AssessError::Validation(msg) if msg.contains("文件过大")));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_request() {
        let mock = MockScoringApi::new();
        mock.respond_score("https://x/a.jpg", 0.9);
        let service = service_with(&mock, false);

        let err = service.assess(&WorkItem::url(0, "https://x/a.jpg")).await.unwrap_err();
        assert_eq!(err, AssessError::Credential);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_file_and_url_paths_hit_api() {
        let mock = MockScoringApi::new();
        mock.respond_score("a.png", 0.7);
        mock.respond_score("https://x/b.jpg", 0.95);
        let service = service_with(&mock, true);

        let file = WorkItem::file(0, "a.png", "image/png", vec![1, 2, 3]);
        assert_eq!(service.assess(&file).await.unwrap(), 0.7);
        assert_eq!(service.assess(&WorkItem::url(1, "https://x/b.jpg")).await.unwrap(), 0.95);

        let calls = mock.calls();
        assert!(calls[0].is_upload);
        assert!(!calls[1].is_upload);
        assert_eq!(calls[1].api_user, "user");
    }
}
