use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult, ConfigError};

/// 默认配置文件路径（可通过 `RAIL_MADAD_CONFIG` 覆盖）
pub const DEFAULT_CONFIG_FILE: &str = "rail_madad.toml";

/// 图片大小上限：20MB
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// 存储后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// 进程内存储，仅用于本地开发和测试
    Memory,
    /// Firestore + Cloud Storage
    Google,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Backend::Memory),
            "google" | "firebase" => Some(Backend::Google),
            _ => None,
        }
    }
}

/// 服务配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听端口
    pub port: u16,
    /// 允许跨域的前端地址
    pub allowed_origins: Vec<String>,
    /// 运行环境，`development` 时错误响应附带详细信息
    pub environment: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 上传图片大小上限（字节）
    pub max_image_bytes: usize,
    /// 文档存储与对象存储后端
    pub backend: Backend,
    // --- 图片描述 / 图片分类 API 配置 ---
    pub caption_api_url: String,
    pub caption_api_key: String,
    pub vision_api_url: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- Google 托管服务配置 ---
    pub google_project_id: String,
    pub firestore_database: String,
    pub gcs_bucket_name: String,
    /// 固定访问令牌；为空时使用应用默认凭证并自动刷新
    pub google_access_token: String,
    pub public_image_base_url: String,
    /// 实际读取的配置文件路径，日志初始化后输出
    #[serde(skip)]
    pub config_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            environment: "production".to_string(),
            verbose_logging: false,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            backend: Backend::Google,
            caption_api_url: String::new(),
            caption_api_key: String::new(),
            vision_api_url: String::new(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            google_project_id: String::new(),
            firestore_database: "(default)".to_string(),
            gcs_bucket_name: String::new(),
            google_access_token: String::new(),
            public_image_base_url: "https://storage.googleapis.com".to_string(),
            config_file: None,
        }
    }
}

impl Config {
    /// 加载配置：默认值 ← TOML 文件 ← 环境变量
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("RAIL_MADAD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    /// 仅从环境变量加载（忽略配置文件）
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::config_file_failed(path, e))?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            AppError::Config(ConfigError::FileParseFailed { source, .. }) => {
                AppError::Config(ConfigError::FileParseFailed {
                    path: path.to_string(),
                    source,
                })
            }
            other => other,
        })?;
        Ok(Self {
            config_file: Some(path.to_string()),
            ..config
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// 用查找函数覆盖字段，便于测试时注入
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(v) = lookup("PORT") {
            self.port = parse_var("PORT", &v, "u16")?;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("APP_ENV") {
            self.environment = v;
        }
        if let Some(v) = lookup("VERBOSE_LOGGING") {
            self.verbose_logging = parse_var("VERBOSE_LOGGING", &v, "bool")?;
        }
        if let Some(v) = lookup("MAX_IMAGE_BYTES") {
            self.max_image_bytes = parse_var("MAX_IMAGE_BYTES", &v, "usize")?;
        }
        if let Some(v) = lookup("RAIL_MADAD_BACKEND") {
            self.backend = Backend::parse(&v).ok_or_else(|| {
                AppError::Config(ConfigError::EnvVarParseFailed {
                    var_name: "RAIL_MADAD_BACKEND".to_string(),
                    value: v.clone(),
                    expected_type: "memory | google".to_string(),
                })
            })?;
        }

        let strings: [(&str, &mut String); 11] = [
            ("HUGGING_FACE_API_URL", &mut self.caption_api_url),
            ("HUGGING_FACE_API_KEY", &mut self.caption_api_key),
            ("VISION_API_URL", &mut self.vision_api_url),
            ("LLM_API_KEY", &mut self.llm_api_key),
            ("LLM_API_BASE_URL", &mut self.llm_api_base_url),
            ("LLM_MODEL_NAME", &mut self.llm_model_name),
            ("GOOGLE_PROJECT_ID", &mut self.google_project_id),
            ("FIRESTORE_DATABASE", &mut self.firestore_database),
            ("GCS_BUCKET_NAME", &mut self.gcs_bucket_name),
            ("GOOGLE_ACCESS_TOKEN", &mut self.google_access_token),
            ("PUBLIC_IMAGE_BASE_URL", &mut self.public_image_base_url),
        ];
        for (key, field) in strings {
            if let Some(v) = lookup(key) {
                *field = v;
            }
        }

        Ok(self)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn caption_configured(&self) -> bool {
        !self.caption_api_url.is_empty() && !self.caption_api_key.is_empty()
    }

    pub fn llm_configured(&self) -> bool {
        !self.llm_api_key.is_empty()
    }

    /// 启动前检查托管服务配置，只告警不退出
    pub fn warn_missing(&self) {
        if !self.caption_configured() {
            warn!("⚠️ 未配置 Hugging Face 图片描述 API，将使用兜底文本");
        }
        if self.vision_api_url.is_empty() {
            warn!("⚠️ 未配置图片分类 API，跳过损坏评估");
        }
        if !self.llm_configured() {
            warn!("⚠️ 未配置 LLM API Key，投诉描述将回退为图片描述");
        }
        if self.backend == Backend::Google {
            if self.google_project_id.is_empty() {
                warn!("⚠️ 未配置 GOOGLE_PROJECT_ID，Firestore 调用将失败");
            }
            if self.gcs_bucket_name.is_empty() {
                warn!("⚠️ 未配置 GCS_BUCKET_NAME，图片上传将失败");
            }
        }
    }
}

fn parse_var<T: std::str::FromStr>(var_name: &str, value: &str, expected_type: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        AppError::Config(ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        })
    })
}
