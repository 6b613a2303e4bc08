//! Hugging Face 推理 API 客户端
//!
//! 封装图片描述（image-to-text）和图片分类（image-classification）两个推理端点。
//! 两个端点都以原始图片字节作为请求体。
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::ImageUpload;

const SERVICE: &str = "hugging-face";

/// 推理请求超时
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 图片分类标签
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageLabel {
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

/// Hugging Face 客户端
pub struct HuggingFaceClient {
    http: reqwest::Client,
    caption_url: String,
    vision_url: String,
    api_key: String,
}

impl HuggingFaceClient {
    /// 创建新的 Hugging Face 客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            caption_url: config.caption_api_url.clone(),
            vision_url: config.vision_api_url.clone(),
            api_key: config.caption_api_key.clone(),
        }
    }

    pub fn caption_configured(&self) -> bool {
        !self.caption_url.is_empty() && !self.api_key.is_empty()
    }

    pub fn vision_configured(&self) -> bool {
        !self.vision_url.is_empty() && !self.api_key.is_empty()
    }

    /// 调用图片描述模型，返回解析出的描述文本
    pub async fn caption(&self, image: &ImageUpload) -> AppResult<String> {
        if !self.caption_configured() {
            return Err(AppError::upstream_not_configured(SERVICE, "HUGGING_FACE_API_URL"));
        }
        let body = self.post_image(&self.caption_url, image).await?;
        Ok(parse_caption(&body))
    }

    /// 调用图片分类模型
    pub async fn classify(&self, image: &ImageUpload) -> AppResult<Vec<ImageLabel>> {
        if !self.vision_configured() {
            return Err(AppError::upstream_not_configured(SERVICE, "VISION_API_URL"));
        }
        let body = self.post_image(&self.vision_url, image).await?;
        parse_labels(body)
    }

    async fn post_image(&self, url: &str, image: &ImageUpload) -> AppResult<Value> {
        debug!("调用 Hugging Face: {} ({})", url, image.size_mb());

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/octet-stream")
            .timeout(REQUEST_TIMEOUT)
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(|e| AppError::upstream_request_failed(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Hugging Face 返回错误: status={}, body={}", status.as_u16(), text);
            return Err(AppError::upstream_bad_response(SERVICE, status.as_u16(), text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::upstream_request_failed(SERVICE, e))?;

        // 部分模型直接返回纯文本
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// 从不同格式的响应中提取描述文本
///
/// 支持 `[{generated_text}]`、`[{label}]`、`{generated_text}` 和字符串。
pub fn parse_caption(body: &Value) -> String {
    let text = match body {
        Value::Array(items) => items.first().and_then(|first| {
            non_empty_text(first.get("generated_text"))
                .or_else(|| non_empty_text(first.get("label")))
        }),
        Value::Object(_) => non_empty_text(body.get("generated_text")),
        Value::String(_) => non_empty_text(Some(body)),
        _ => None,
    };

    match text {
        Some(t) => t.to_string(),
        None => {
            warn!("图片描述响应格式未知: {}", body);
            "Image caption generated successfully".to_string()
        }
    }
}

/// 空串、null 都视为没有文本
fn non_empty_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 解析分类结果，部分部署会多包一层数组
pub fn parse_labels(body: Value) -> AppResult<Vec<ImageLabel>> {
    let body = match body {
        Value::Array(mut items) if matches!(items.first(), Some(Value::Array(_))) => items.swap_remove(0),
        other => other,
    };
    serde_json::from_value(body).map_err(|e| AppError::upstream_parse_failed(SERVICE, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_caption_formats() {
        assert_eq!(
            parse_caption(&json!([{ "generated_text": "a broken train window " }])),
            "a broken train window"
        );
        assert_eq!(parse_caption(&json!([{ "label": "seat" }])), "seat");
        assert_eq!(
            parse_caption(&json!({ "generated_text": "dirty floor" })),
            "dirty floor"
        );
        assert_eq!(parse_caption(&json!("plain caption")), "plain caption");
    }

    #[test]
    fn test_parse_caption_skips_empty_text() {
        assert_eq!(
            parse_caption(&json!([{ "generated_text": "", "label": "platform" }])),
            "platform"
        );
        assert_eq!(
            parse_caption(&json!([{ "generated_text": null, "label": "coach" }])),
            "coach"
        );
        assert_eq!(
            parse_caption(&json!([{ "generated_text": "  " }])),
            "Image caption generated successfully"
        );
        assert_eq!(
            parse_caption(&json!({ "generated_text": "" })),
            "Image caption generated successfully"
        );
        assert_eq!(parse_caption(&json!("")), "Image caption generated successfully");
    }

    #[test]
    fn test_parse_caption_unknown_format() {
        assert_eq!(
            parse_caption(&json!({ "foo": 1 })),
            "Image caption generated successfully"
        );
        assert_eq!(
            parse_caption(&json!([])),
            "Image caption generated successfully"
        );
        assert_eq!(
            parse_caption(&json!(42)),
            "Image caption generated successfully"
        );
    }

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels(json!([
            { "label": "passenger car", "score": 0.8 },
            { "label": "window shade", "score": 0.1 }
        ]))
        .unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "passenger car");

        let nested = parse_labels(json!([[{ "label": "rust", "score": 0.5 }]])).unwrap();
        assert_eq!(nested[0].label, "rust");

        assert!(parse_labels(json!({ "error": "loading" })).is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = HuggingFaceClient::new(&Config::default());
        let image = ImageUpload::new("a.png", "image/png", Default::default(), 10).unwrap();
        assert!(client.caption(&image).await.is_err());
        assert!(client.classify(&image).await.is_err());
    }
}
