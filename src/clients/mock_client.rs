//! 测试用评分客户端
//!
//! 按文件名或 URL 预设响应，记录每次调用，并统计同时在途的请求数峰值。

use crate::clients::scoring_client::{ApiResponse, FileUpload, ScoringApi};
use crate::error::AssessError;
use crate::services::credential_store::Credentials;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 一次调用的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// 文件名或 URL
    pub key: String,
    pub api_user: String,
    pub is_upload: bool,
}

/// 测试用评分客户端
///
/// ```ignore
/// let mock = MockScoringApi::new();
/// mock.respond_score("a.jpg", 0.9);
/// mock.respond_error("b.jpg", AssessError::Transport("timeout".into()));
/// ```
#[derive(Clone, Default)]
pub struct MockScoringApi {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<ApiResponse, AssessError>>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockScoringApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前先等待一段时间，用于观察并发
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 预设响应，同一个 key 的多个响应按 FIFO 返回，最后一个会被重复使用
    pub fn respond(&self, key: &str, response: Result<ApiResponse, AssessError>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    /// 预设一个成功的分数响应
    pub fn respond_score(&self, key: &str, score: f64) {
        self.respond(key, Ok(Self::success_body(score)));
    }

    pub fn respond_error(&self, key: &str, error: AssessError) {
        self.respond(key, Err(error));
    }

    /// 标准的成功响应
    pub fn success_body(score: f64) -> ApiResponse {
        ApiResponse {
            status: 200,
            body: json!({
                "status": "success",
                "request": { "id": "req_mock", "timestamp": 0, "operations": 1 },
                "quality": { "score": score }
            })
            .to_string(),
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// 同时在途请求数的峰值
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn handle(&self, key: &str, credentials: &Credentials, is_upload: bool) -> Result<ApiResponse, AssessError> {
        self.calls.lock().push(MockCall {
            key: key.to_string(),
            api_user: credentials.api_user.clone(),
            is_upload,
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut responses = self.responses.lock();
        match responses.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Err(Self::missing(key))),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Err(Self::missing(key))),
            None => Err(Self::missing(key)),
        }
    }

    fn missing(key: &str) -> AssessError {
        AssessError::Service(format!("没有为 {} 预设响应", key))
    }
}

#[async_trait]
impl ScoringApi for MockScoringApi {
    async fn check_file(
        &self,
        file: FileUpload<'_>,
        credentials: &Credentials,
    ) -> Result<ApiResponse, AssessError> {
        self.handle(file.name, credentials, true).await
    }

    async fn check_url(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<ApiResponse, AssessError> {
        self.handle(url, credentials, false).await
    }
}

/// 离开作用域时减少在途计数
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fifo_then_repeat_last() {
        let mock = MockScoringApi::new();
        mock.respond_score("https://x/a.jpg", 0.1);
        mock.respond_score("https://x/a.jpg", 0.2);
        let creds = Credentials::new("u", "s");

        let first = mock.check_url("https://x/a.jpg", &creds).await.unwrap();
        let second = mock.check_url("https://x/a.jpg", &creds).await.unwrap();
        let third = mock.check_url("https://x/a.jpg", &creds).await.unwrap();

        assert_eq!(first, MockScoringApi::success_body(0.1));
        assert_eq!(second, MockScoringApi::success_body(0.2));
        assert_eq!(third, second);
        assert_eq!(mock.call_count(), 3);
        assert!(!mock.calls()[0].is_upload);
    }

    #[tokio::test]
    async fn test_mock_unconfigured_key() {
        let mock = MockScoringApi::new();
        let result = mock.check_url("https://x/none.jpg", &Credentials::new("u", "s")).await;
        assert!(matches!(result, Err(AssessError::Service(_))));
        assert_eq!(mock.peak_in_flight(), 1);
    }
}
