//! 上传图片
//!
//! 表单中 `image` 字段的文件内容，构造时完成类型和大小校验。

use std::sync::LazyLock;

use axum::body::Bytes;
use regex::Regex;

use crate::error::{AppResult, ValidationError};

/// 允许上传的图片 MIME 类型
pub static ALLOWED_IMAGE_TYPES: phf::Set<&'static str> = phf::phf_set! {
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
    "image/tiff",
};

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("文件名正则无效"));

/// 已校验的上传图片
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// 校验 MIME 类型与大小
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Bytes,
        max_bytes: usize,
    ) -> AppResult<Self> {
        let content_type = content_type.into().to_ascii_lowercase();

        if bytes.len() > max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: bytes.len(),
                max_bytes,
            }
            .into());
        }

        if !ALLOWED_IMAGE_TYPES.contains(content_type.as_str()) {
            return Err(ValidationError::InvalidFileType { mime: content_type }.into());
        }

        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// 大小（MB，两位小数），仅用于日志
    pub fn size_mb(&self) -> String {
        format!("{:.2}MB", self.bytes.len() as f64 / 1024.0 / 1024.0)
    }

    /// 对象存储中的路径：`images/<毫秒时间戳>-<清洗后的原文件名>`
    pub fn object_name(&self, timestamp_millis: i64) -> String {
        let cleaned = UNSAFE_NAME_CHARS.replace_all(self.file_name.trim(), "_");
        let cleaned = cleaned.trim_matches('_');
        let name = if cleaned.is_empty() { "upload" } else { cleaned };
        format!("images/{}-{}", timestamp_millis, name)
    }
}
