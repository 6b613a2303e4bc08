use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求校验失败（400）
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// 资源不存在（404）
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    /// 外部托管服务调用失败
    #[error("上游服务错误: {0}")]
    Upstream(#[from] UpstreamError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 请求校验错误
///
/// `Display` 文本直接作为响应体中的 `error` 字段返回给前端。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image file provided")]
    NoImageProvided,
    #[error("PNR and subject are required")]
    MissingPnrOrSubject,
    #[error("PNR must be exactly 10 digits")]
    InvalidPnr,
    #[error("File too large. Maximum size allowed is {}.", size_limit(.max_bytes))]
    FileTooLarge { size: usize, max_bytes: usize },
    #[error("Invalid file type. Please upload a valid image file (JPEG, PNG, GIF, BMP, WebP, or TIFF).")]
    InvalidFileType { mime: String },
    #[error("Unexpected file field. Please upload image in the correct field.")]
    UnexpectedFileField { field: String },
    #[error("Malformed form data: {reason}")]
    MalformedForm { reason: String },
    #[error("Missing required fields")]
    MissingStatusFields,
    #[error("Unknown status '{status}'. Expected Pending or Resolved")]
    UnknownStatus { status: String },
}

/// 大小上限的展示文本：不足 1MB 时按 KB 显示，均向上取整
fn size_limit(max_bytes: &usize) -> String {
    let max_bytes = *max_bytes;
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    if max_bytes >= MB {
        format!("{}MB", max_bytes.div_ceil(MB))
    } else {
        format!("{}KB", max_bytes.div_ceil(KB).max(1))
    }
}

/// 资源不存在
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("No complaints found for this PNR")]
    Pnr { pnr: String },
    #[error("Complaint not found")]
    Complaint { pnr: String, complaint_id: String },
}

/// 外部服务错误
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 网络请求失败
    #[error("{service} 请求失败: {source}")]
    RequestFailed {
        service: &'static str,
        #[source]
        source: BoxError,
    },
    /// 服务返回非 2xx
    #[error("{service} 返回错误响应: status={status}, body={body}")]
    BadResponse {
        service: &'static str,
        status: u16,
        body: String,
    },
    /// 响应体无法解析
    #[error("{service} 响应解析失败: {source}")]
    ParseFailed {
        service: &'static str,
        #[source]
        source: BoxError,
    },
    /// 缺少必要配置
    #[error("{service} 未配置: {setting}")]
    NotConfigured {
        service: &'static str,
        setting: &'static str,
    },
}

impl UpstreamError {
    /// 上游返回的 HTTP 状态码（如有）
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::BadResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API Key 未配置")]
    NotConfigured,
    #[error("构建 LLM 请求失败: {source}")]
    RequestBuildFailed {
        #[source]
        source: BoxError,
    },
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::FileParseFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<async_openai::error::OpenAIError> for AppError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AppError::Llm(LlmError::RequestBuildFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建上游请求失败错误
    pub fn upstream_request_failed(
        service: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Upstream(UpstreamError::RequestFailed {
            service,
            source: Box::new(source),
        })
    }

    /// 创建上游响应错误
    pub fn upstream_bad_response(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        AppError::Upstream(UpstreamError::BadResponse {
            service,
            status,
            body: body.into(),
        })
    }

    /// 创建上游响应解析错误
    pub fn upstream_parse_failed(
        service: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Upstream(UpstreamError::ParseFailed {
            service,
            source: Box::new(source),
        })
    }

    /// 创建上游未配置错误
    pub fn upstream_not_configured(service: &'static str, setting: &'static str) -> Self {
        AppError::Upstream(UpstreamError::NotConfigured { service, setting })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建配置文件读取错误
    pub fn config_file_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Config(ConfigError::FileReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否属于客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
