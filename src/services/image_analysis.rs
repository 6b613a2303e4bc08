//! 图片分析服务 - 业务能力层
//!
//! 只负责"看图"能力：生成图片描述、给出分类标签，并据标签评估是否与铁路损坏相关。
//! 外部调用失败不会中断投诉流程，而是退化为兜底文本或空标签。

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clients::{HuggingFaceClient, ImageLabel};
use crate::error::{AppError, UpstreamError};
use crate::models::ImageUpload;
use crate::utils::logging::truncate_text;

/// 损坏相关关键词
pub const DAMAGE_KEYWORDS: &[&str] = &[
    "broken",
    "crack",
    "damage",
    "rust",
    "corrosion",
    "deterioration",
    "vandalism",
    "graffiti",
    "missing",
    "worn",
    "defect",
    "repair",
    "maintenance",
    "safety",
    "hazard",
    "emergency",
];

/// 铁路相关关键词
pub const RAILWAY_KEYWORDS: &[&str] = &[
    "train",
    "railway",
    "railroad",
    "track",
    "station",
    "platform",
    "window",
    "door",
    "seat",
    "coach",
    "carriage",
    "locomotive",
];

/// 图片描述结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    /// 模型生成的描述
    Generated(String),
    /// 调用失败时的兜底文本
    Fallback(String),
}

impl CaptionOutcome {
    pub fn text(&self) -> &str {
        match self {
            CaptionOutcome::Generated(t) | CaptionOutcome::Fallback(t) => t,
        }
    }

    /// 仅在真正生成了描述时返回
    pub fn generated(&self) -> Option<&str> {
        match self {
            CaptionOutcome::Generated(t) => Some(t),
            CaptionOutcome::Fallback(_) => None,
        }
    }
}

/// 根据失败原因选择兜底文本
pub fn caption_fallback(err: &AppError) -> &'static str {
    match err {
        AppError::Upstream(UpstreamError::NotConfigured { .. }) => {
            "Unable to generate image caption - API not configured"
        }
        AppError::Upstream(e) => match e.status() {
            Some(401) => "Unable to generate caption - authentication failed",
            Some(503) => "Image analysis in progress - model loading",
            Some(429) => "Caption service temporarily unavailable - rate limit",
            _ => "Unable to generate image caption at this time",
        },
        _ => "Unable to generate image caption at this time",
    }
}

/// 铁路损坏评估
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DamageAssessment {
    /// 命中损坏关键词的标签置信度之和
    pub damage_score: f64,
    /// 命中铁路关键词的标签置信度之和
    pub railway_score: f64,
    pub suspicious_labels: Vec<ImageLabel>,
    pub railway_labels: Vec<ImageLabel>,
}

impl DamageAssessment {
    pub fn is_empty(&self) -> bool {
        self.suspicious_labels.is_empty() && self.railway_labels.is_empty()
    }
}

fn matches_any(label: &ImageLabel, keywords: &[&str]) -> bool {
    let text = label.label.to_lowercase();
    keywords.iter().any(|k| text.contains(k))
}

/// 按关键词评估分类标签
pub fn assess_labels(labels: &[ImageLabel]) -> DamageAssessment {
    let suspicious_labels: Vec<ImageLabel> = labels
        .iter()
        .filter(|l| matches_any(l, DAMAGE_KEYWORDS))
        .cloned()
        .collect();
    let railway_labels: Vec<ImageLabel> = labels
        .iter()
        .filter(|l| matches_any(l, RAILWAY_KEYWORDS))
        .cloned()
        .collect();

    DamageAssessment {
        damage_score: suspicious_labels.iter().map(|l| l.score).sum(),
        railway_score: railway_labels.iter().map(|l| l.score).sum(),
        suspicious_labels,
        railway_labels,
    }
}

/// 图片分析能力
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// 生成图片描述，失败时返回兜底文本
    async fn caption(&self, image: &ImageUpload) -> CaptionOutcome;

    /// 图片分类，失败时返回空列表
    async fn classify(&self, image: &ImageUpload) -> Vec<ImageLabel>;
}

#[async_trait]
impl ImageAnalyzer for HuggingFaceClient {
    async fn caption(&self, image: &ImageUpload) -> CaptionOutcome {
        match HuggingFaceClient::caption(self, image).await {
            Ok(text) => {
                info!("✓ 图片描述: {}", truncate_text(&text, 80));
                CaptionOutcome::Generated(text)
            }
            Err(e) => {
                warn!("⚠️ 图片描述失败，使用兜底文本: {}", e);
                CaptionOutcome::Fallback(caption_fallback(&e).to_string())
            }
        }
    }

    async fn classify(&self, image: &ImageUpload) -> Vec<ImageLabel> {
        match HuggingFaceClient::classify(self, image).await {
            Ok(labels) => {
                info!("✓ 图片分类完成，{} 个标签", labels.len());
                labels
            }
            Err(e) => {
                warn!("⚠️ 图片分类失败，跳过损坏评估: {}", e);
                Vec::new()
            }
        }
    }
}
