//! 评分服务客户端
//!
//! 封装与 Sightengine `check.json` 的 HTTP 交互，只负责把请求发出去、
//! 把原始响应带回来；响应的解释在 `services::assessment_service` 中完成。

use crate::config::Config;
use crate::error::AssessError;
use crate::services::credential_store::Credentials;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, error, info};

/// 评分服务的原始响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP 状态码
    pub status: u16,
    /// 响应正文
    pub body: String,
}

/// 待上传的文件
#[derive(Debug, Clone, Copy)]
pub struct FileUpload<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

/// 评分服务接口
///
/// 生产环境使用 [`SightengineClient`]，测试使用 `MockScoringApi`。
/// 只有网络层面的失败才会返回 `Err`，HTTP 错误码原样放在 `ApiResponse` 中。
#[async_trait]
pub trait ScoringApi: Send + Sync {
    /// multipart 上传文件进行评估
    async fn check_file(
        &self,
        file: FileUpload<'_>,
        credentials: &Credentials,
    ) -> Result<ApiResponse, AssessError>;

    /// 通过 URL 评估
    async fn check_url(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<ApiResponse, AssessError>;
}

/// Sightengine 客户端
#[derive(Clone)]
pub struct SightengineClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl SightengineClient {
    /// 创建新的评分客户端
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.api_endpoint.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// 发送请求并读取完整响应
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, AssessError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AssessError::Transport(format!("读取响应失败: {}", e)))?;

        debug!(status, response_len = body.len(), "评分请求完成");

        Ok(ApiResponse { status, body })
    }

    fn transport_error(&self, e: reqwest::Error) -> AssessError {
        error!(endpoint = %self.endpoint, error = %e, "评分请求失败");
        if e.is_timeout() {
            AssessError::Transport(format!("请求超时 ({} 秒)", self.timeout.as_secs()))
        } else if e.is_connect() {
            AssessError::Transport(format!("无法连接到评分服务: {}", e))
        } else {
            AssessError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ScoringApi for SightengineClient {
    async fn check_file(
        &self,
        file: FileUpload<'_>,
        credentials: &Credentials,
    ) -> Result<ApiResponse, AssessError> {
        info!(
            "📤 上传文件评估: {} ({} 字节, {})",
            file.name,
            file.bytes.len(),
            file.mime_type
        );

        let media = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.to_string())
            .mime_str(file.mime_type)
            .map_err(|e| AssessError::Validation(format!("无效的 MIME 类型 {}: {}", file.mime_type, e)))?;

        let form = Form::new()
            .part("media", media)
            .text("models", "quality")
            .text("api_user", credentials.api_user.clone())
            .text("api_secret", credentials.api_secret.clone());

        self.send(self.client.post(&self.endpoint).multipart(form))
            .await
    }

    async fn check_url(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<ApiResponse, AssessError> {
        info!("🔗 通过 URL 评估: {}", url);

        let request = self.client.get(&self.endpoint).query(&[
            ("url", url),
            ("models", "quality"),
            ("api_user", credentials.api_user.as_str()),
            ("api_secret", credentials.api_secret.as_str()),
        ]);

        self.send(request).await
    }
}
