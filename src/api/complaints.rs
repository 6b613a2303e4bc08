//! 乘客端接口：提交投诉、按 PNR 查询、健康检查

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::api::{ApiError, AppState};
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{ComplaintForm, ImageUpload, Pnr};

/// 图片所在的表单字段名
pub const IMAGE_FIELD: &str = "image";

pub async fn root() -> &'static str {
    "Hello World!"
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "Complaint service is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// POST /submit-complaint
pub async fn submit_complaint(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // 不是 multipart 表单时视为没有上传图片
    let multipart = multipart.map_err(|rejection| {
        debug!("非 multipart 请求: {}", rejection.body_text());
        state.reject(ValidationError::NoImageProvided)
    })?;
    let form = read_complaint_form(multipart, state.max_image_bytes)
        .await
        .map_err(|e| state.reject(e))?;
    let submission = form.validate().map_err(|e| state.reject(e))?;

    let pnr = submission.pnr.clone();
    let complaint = state
        .flow
        .submit(submission)
        .await
        .map_err(|e| state.reject(e))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Complaint submitted successfully",
            "pnr": pnr,
            "complaintId": complaint.id,
            "complaintData": complaint,
        })),
    ))
}

/// GET /complaints/:pnr
pub async fn get_complaints(
    State(state): State<AppState>,
    Path(raw_pnr): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pnr = Pnr::parse(&raw_pnr).map_err(|e| state.reject(e))?;
    let complaints = state
        .flow
        .complaints_for(&pnr)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(json!({
        "message": "Complaints retrieved successfully",
        "pnr": pnr,
        "totalComplaints": complaints.len(),
        "complaints": complaints,
    })))
}

/// 读取投诉表单
///
/// 图片在读取时即完成类型和大小校验；其他文件字段直接拒绝。
pub async fn read_complaint_form(
    mut multipart: Multipart,
    max_image_bytes: usize,
) -> AppResult<ComplaintForm> {
    let mut form = ComplaintForm::default();
    let form_error = |e: MultipartError| multipart_error(e, max_image_bytes);

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if name != IMAGE_FIELD {
                return Err(ValidationError::UnexpectedFileField { field: name }.into());
            }
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(form_error)?;
            debug!("收到图片 {} ({}, {} 字节)", file_name, content_type, bytes.len());

            form.image = Some(ImageUpload::new(file_name, content_type, bytes, max_image_bytes)?);
            continue;
        }

        let value = field.text().await.map_err(form_error)?;
        match name.as_str() {
            "pnr" => form.pnr = Some(value),
            "subject" => form.subject = Some(value),
            "station" => form.station = Some(value),
            other => debug!("忽略表单字段: {}", other),
        }
    }

    if let Some(station) = form.station.as_deref() {
        info!("🚉 投诉车站: {}", station);
    }
    Ok(form)
}

fn multipart_error(err: MultipartError, max_image_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::FileTooLarge {
            size: max_image_bytes + 1,
            max_bytes: max_image_bytes,
        }
        .into()
    } else {
        ValidationError::MalformedForm {
            reason: err.body_text(),
        }
        .into()
    }
}
