//! Google 访问令牌
//!
//! 配置了 `GOOGLE_ACCESS_TOKEN` 时直接使用该令牌；否则通过 `gcp_auth` 按
//! 应用默认凭证（服务账号文件 / gcloud / 元数据服务器）获取，令牌由其缓存并自动刷新。

use std::sync::Arc;

use gcp_auth::TokenProvider;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const SERVICE: &str = "google-auth";

/// Firestore 与 Cloud Storage 共用的权限范围
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Google 凭证来源
pub enum GoogleAuth {
    /// 固定令牌（本地调试或外部注入）
    Static(String),
    /// 应用默认凭证，首次使用时初始化
    Default(OnceCell<Arc<dyn TokenProvider>>),
    /// 不带认证头（本地模拟器）
    Anonymous,
}

impl GoogleAuth {
    /// 根据配置选择凭证来源
    pub fn from_config(config: &Config) -> Arc<Self> {
        let auth = if config.google_access_token.is_empty() {
            GoogleAuth::Default(OnceCell::new())
        } else {
            GoogleAuth::Static(config.google_access_token.clone())
        };
        Arc::new(auth)
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(GoogleAuth::Anonymous)
    }

    /// 当前可用的 Bearer 令牌，`Anonymous` 时为 `None`
    pub async fn bearer(&self) -> AppResult<Option<String>> {
        match self {
            GoogleAuth::Static(token) => Ok(Some(token.clone())),
            GoogleAuth::Anonymous => Ok(None),
            GoogleAuth::Default(cell) => {
                let provider = cell
                    .get_or_try_init(|| async {
                        let provider = gcp_auth::provider()
                            .await
                            .map_err(|e| AppError::upstream_request_failed(SERVICE, e))?;
                        let project = provider.project_id().await.map(|p| p.to_string());
                        info!("🔑 已加载 Google 默认凭证，项目: {}", project.unwrap_or_default());
                        Ok::<_, AppError>(provider)
                    })
                    .await?;

                let token = provider
                    .token(&[CLOUD_PLATFORM_SCOPE])
                    .await
                    .map_err(|e| AppError::upstream_request_failed(SERVICE, e))?;
                Ok(Some(token.as_str().to_string()))
            }
        }
    }

    /// 给请求加上认证头
    pub async fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> AppResult<reqwest::RequestBuilder> {
        Ok(match self.bearer().await? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}
