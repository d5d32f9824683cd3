//! 凭据存储 - 业务能力层
//!
//! 只负责保存 / 读取 / 清除 Sightengine 凭据，由调用方显式注入

use crate::error::{AppResult, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sightengine API 凭据
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_user: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_user: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_user: api_user.into(),
            api_secret: api_secret.into(),
        }
    }

    /// 从 SIGHTENGINE_API_USER / SIGHTENGINE_API_SECRET 读取
    pub fn from_env() -> Option<Self> {
        let api_user = std::env::var("SIGHTENGINE_API_USER").ok()?;
        let api_secret = std::env::var("SIGHTENGINE_API_SECRET").ok()?;
        if api_user.is_empty() || api_secret.is_empty() {
            return None;
        }
        Some(Self::new(api_user, api_secret))
    }
}

// secret 不能出现在日志里
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_user", &self.api_user)
            .field("api_secret", &"***hidden***")
            .finish()
    }
}

/// 凭据存储
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credentials>;
    fn set(&self, credentials: Credentials) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;

    fn has_credentials(&self) -> bool {
        self.get().is_some()
    }
}

/// 进程内凭据存储
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credentials> {
        self.inner.read().clone()
    }

    fn set(&self, credentials: Credentials) -> AppResult<()> {
        *self.inner.write() = Some(credentials);
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.inner.write() = None;
        Ok(())
    }
}

/// JSON 文件凭据存储
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    /// 文件不存在或内容损坏都视为"未配置"
    fn get(&self) -> Option<Credentials> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("⚠️ 凭据文件无法解析 ({}): {}", self.path.display(), e);
                None
            }
        }
    }

    fn set(&self, credentials: Credentials) -> AppResult<()> {
        let path = self.path.display().to_string();
        let json = serde_json::to_string_pretty(&credentials)
            .map_err(|e| StoreError::json(&path, e))?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::io(&path, e))?;
        debug!("凭据已保存: {}", path);
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(self.path.display().to_string(), e).into()),
        }
    }
}
