//! Google Cloud Storage 客户端
//!
//! 使用 JSON API 的 simple upload（`uploadType=media`）上传图片
use std::sync::Arc;

use tracing::{debug, info};

use crate::clients::google_auth::GoogleAuth;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::ImageUpload;

const SERVICE: &str = "cloud-storage";
const UPLOAD_BASE_URL: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Cloud Storage 客户端
pub struct GcsClient {
    http: reqwest::Client,
    upload_base_url: String,
    bucket: String,
    auth: Arc<GoogleAuth>,
    public_base_url: String,
}

impl GcsClient {
    /// 创建新的 Cloud Storage 客户端
    pub fn new(config: &Config, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_base_url: UPLOAD_BASE_URL.to_string(),
            bucket: config.gcs_bucket_name.clone(),
            auth,
            public_base_url: config.public_image_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 对象的公开访问地址
    pub fn public_url(&self, object_name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, object_name)
    }

    /// 上传对象并返回公开访问地址
    ///
    /// # 参数
    /// - `object_name`: 对象路径（已清洗，不含需要转义的字符）
    /// - `image`: 已校验的图片
    pub async fn upload(&self, object_name: &str, image: &ImageUpload) -> AppResult<String> {
        if self.bucket.is_empty() {
            return Err(AppError::upstream_not_configured(SERVICE, "GCS_BUCKET_NAME"));
        }

        let url = format!("{}/b/{}/o", self.upload_base_url, self.bucket);
        debug!("上传对象: gs://{}/{} ({})", self.bucket, object_name, image.size_mb());

        let request = self
            .http
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object_name)])
            .header("Content-Type", image.content_type.as_str())
            .body(image.bytes.clone());

        let response = self
            .auth
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| AppError::upstream_request_failed(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::upstream_bad_response(SERVICE, status.as_u16(), text));
        }

        info!("✓ 图片已上传: {}", object_name);
        Ok(self.public_url(object_name))
    }
}
