//! HTTP 接口层
//!
//! 把 axum 请求转换为流程层调用，再把结果或错误转换为 JSON 响应。

pub mod admin;
pub mod complaints;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::config::Config;
use crate::error::{AppError, NotFoundError};
use crate::workflow::ComplaintFlow;

/// multipart 表单中除图片外的其他部分允许的额外字节数
pub const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// 所有路由，供启动日志打印
pub const ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("GET", "/health"),
    ("POST", "/submit-complaint"),
    ("GET", "/complaints/:pnr"),
    ("GET", "/get-complaints"),
    ("POST", "/change-status"),
];

/// 请求处理共享状态
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<ComplaintFlow>,
    pub max_image_bytes: usize,
    /// 500 响应中是否返回底层错误信息（仅开发环境）
    pub expose_details: bool,
}

impl AppState {
    pub fn new(flow: ComplaintFlow, config: &Config) -> Self {
        Self {
            flow: Arc::new(flow),
            max_image_bytes: config.max_image_bytes,
            expose_details: config.is_development(),
        }
    }

    /// 把业务错误包装为 HTTP 错误响应
    pub fn reject(&self, err: impl Into<AppError>) -> ApiError {
        ApiError {
            inner: err.into(),
            expose_details: self.expose_details,
        }
    }
}

/// 携带响应策略的错误
#[derive(Debug)]
pub struct ApiError {
    inner: AppError,
    expose_details: bool,
}

impl ApiError {
    pub fn inner(&self) -> &AppError {
        &self.inner
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.inner {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            AppError::NotFound(e @ NotFoundError::Pnr { pnr }) => (
                StatusCode::NOT_FOUND,
                json!({ "error": e.to_string(), "pnr": pnr, "complaints": [] }),
            ),
            AppError::NotFound(e @ NotFoundError::Complaint { pnr, complaint_id }) => (
                StatusCode::NOT_FOUND,
                json!({ "error": e.to_string(), "pnr": pnr, "complaintId": complaint_id }),
            ),
            other => {
                error!("❌ 请求处理失败: {}", other);
                let details = if self.expose_details {
                    other.to_string()
                } else {
                    "Please try again later".to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "details": details }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// 构建 CORS 层：只允许配置中的来源，并允许携带凭证
fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️ 忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// 构建完整路由
pub fn router(state: AppState, config: &Config) -> Router {
    let body_limit = state.max_image_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(complaints::root))
        .route("/health", get(complaints::health))
        .route("/submit-complaint", post(complaints::submit_complaint))
        .route("/complaints/:pnr", get(complaints::get_complaints))
        .route("/get-complaints", get(admin::get_pending_complaints))
        .route("/change-status", post(admin::change_complaint_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
