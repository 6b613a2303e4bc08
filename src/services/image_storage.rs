//! 图片存储 - 业务能力层
//!
//! 只负责"把图片放到对象存储并给出访问地址"能力

use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::clients::GcsClient;
use crate::error::AppResult;
use crate::models::ImageUpload;

/// 图片存储
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// 保存图片，返回可访问的 URL
    async fn store(&self, image: &ImageUpload) -> AppResult<String>;
}

/// Cloud Storage 实现
pub struct GcsImageStorage {
    client: GcsClient,
}

impl GcsImageStorage {
    pub fn new(client: GcsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageStorage for GcsImageStorage {
    async fn store(&self, image: &ImageUpload) -> AppResult<String> {
        let object_name = image.object_name(Utc::now().timestamp_millis());
        self.client.upload(&object_name, image).await
    }
}

/// 进程内实现，URL 形如 `memory://images/<ts>-<name>`
#[derive(Default)]
pub struct InMemoryImageStorage {
    objects: RwLock<HashMap<String, (String, Bytes)>>,
}

impl InMemoryImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取已保存对象的 (content_type, bytes)
    pub async fn get(&self, url: &str) -> Option<(String, Bytes)> {
        let name = url.strip_prefix("memory://")?;
        self.objects.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ImageStorage for InMemoryImageStorage {
    async fn store(&self, image: &ImageUpload) -> AppResult<String> {
        let object_name = image.object_name(Utc::now().timestamp_millis());
        self.objects.write().await.insert(
            object_name.clone(),
            (image.content_type.clone(), image.bytes.clone()),
        );
        Ok(format!("memory://{}", object_name))
    }
}
