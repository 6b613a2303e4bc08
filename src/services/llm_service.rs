//! LLM 服务 - 业务能力层
//!
//! 只负责"根据图片和描述写出投诉内容"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::services::image_analysis::DamageAssessment;

/// 投诉描述最大长度（字符）
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

const SYSTEM_MESSAGE: &str = "You help Indian Railways passengers file complaints. \
Given a photo and a few facts about it, write a short, factual complaint description \
in the first person (2-4 sentences). Mention what is wrong and where, \
do not invent details that are not supported by the input, and do not add greetings or a signature.";

/// 生成投诉描述所需的输入
#[derive(Debug, Clone, Copy)]
pub struct DescriptionRequest<'a> {
    pub subject: &'a str,
    pub station: Option<&'a str>,
    pub caption: Option<&'a str>,
    pub assessment: &'a DamageAssessment,
    pub image_url: Option<&'a str>,
}

/// 投诉描述生成能力
#[async_trait]
pub trait DescriptionWriter: Send + Sync {
    async fn describe(&self, request: &DescriptionRequest<'_>) -> AppResult<String>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 生成投诉描述
/// - 提供通用的 LLM 调用接口（支持图片）
/// - 只处理单条投诉
/// - 不关心存储和流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    configured: bool,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            configured: config.llm_configured(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `imgs`: 图片 URL 列表（可选），以 Vision 格式附加在用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        imgs: Option<&[String]>,
    ) -> AppResult<String> {
        if !self.configured {
            return Err(LlmError::NotConfigured.into());
        }

        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match imgs {
            Some(img_urls) if !img_urls.is_empty() => {
                let mut content_parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                )];

                for url in img_urls {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Low),
                            },
                        },
                    ));
                }

                debug!("使用 Vision API，包含 {} 张图片", img_urls.len());

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(300u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl DescriptionWriter for LlmService {
    async fn describe(&self, request: &DescriptionRequest<'_>) -> AppResult<String> {
        let user_message = build_description_prompt(request);

        // memory:// 等非公网地址模型无法访问，只发文字
        let imgs: Option<Vec<String>> = request
            .image_url
            .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
            .map(|url| vec![url.to_string()]);

        let response = self
            .send_to_llm(&user_message, Some(SYSTEM_MESSAGE), imgs.as_deref())
            .await?;

        let description = clean_description(&response);
        if description.is_empty() {
            return Err(LlmError::EmptyContent {
                model: self.model_name.clone(),
            }
            .into());
        }
        Ok(description)
    }
}

/// 构建投诉描述提示词
pub fn build_description_prompt(request: &DescriptionRequest<'_>) -> String {
    let mut prompt = format!("Complaint subject: {}\n", request.subject.trim());

    if let Some(station) = request.station.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("Station: {}\n", station));
    }

    match request.caption {
        Some(caption) => prompt.push_str(&format!("Automatic image caption: {}\n", caption)),
        None => prompt.push_str("Automatic image caption: unavailable\n"),
    }

    let assessment = request.assessment;
    if !assessment.is_empty() {
        let names = |labels: &[crate::clients::ImageLabel]| {
            labels
                .iter()
                .map(|l| format!("{} ({:.0}%)", l.label, l.score * 100.0))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if !assessment.railway_labels.is_empty() {
            prompt.push_str(&format!(
                "Railway-related objects: {}\n",
                names(&assessment.railway_labels)
            ));
        }
        if !assessment.suspicious_labels.is_empty() {
            prompt.push_str(&format!(
                "Possible damage indicators: {}\n",
                names(&assessment.suspicious_labels)
            ));
        }
        prompt.push_str(&format!(
            "Railway relevance: {:.1}%, damage likelihood: {:.1}%\n",
            assessment.railway_score * 100.0,
            assessment.damage_score * 100.0
        ));
    }

    prompt.push_str("\nWrite the complaint description. Reply with the description text only.");
    prompt
}

/// 清理模型输出：去掉引号、"Description:" 前缀，并限制长度
pub fn clean_description(response: &str) -> String {
    let mut text = response.trim();

    for prefix in ["Complaint description:", "Description:"] {
        let matched = text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matched {
            text = text[prefix.len()..].trim_start();
        }
    }

    let text = text.trim_matches(|c| c == '"' || c == '“' || c == '”').trim();

    if text.chars().count() > MAX_DESCRIPTION_CHARS {
        text.chars().take(MAX_DESCRIPTION_CHARS).collect()
    } else {
        text.to_string()
    }
}
