//! 管理端接口：待处理投诉列表、修改投诉状态

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::{ApiError, AppState};
use crate::error::ValidationError;
use crate::models::{ComplaintStatus, Pnr};
use crate::workflow::PendingOverview;

/// POST /change-status 请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub pnr: Option<String>,
    pub complaint_id: Option<String>,
    pub new_status: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /get-complaints
pub async fn get_pending_complaints(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let overview = state.flow.pending().await.map_err(|e| state.reject(e))?;

    let body = match overview {
        PendingOverview::NoComplaints => json!({ "message": "No complaints found" }),
        PendingOverview::NonePending => json!({ "message": "No pending complaints found" }),
        PendingOverview::Pending(pending) => json!({ "pendingComplaints": pending }),
    };
    Ok(Json(body))
}

/// POST /change-status
pub async fn change_complaint_status(
    State(state): State<AppState>,
    payload: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        state.reject(ValidationError::MalformedForm {
            reason: rejection.body_text(),
        })
    })?;

    let (Some(raw_pnr), Some(complaint_id), Some(new_status)) = (
        required(request.pnr),
        required(request.complaint_id),
        required(request.new_status),
    ) else {
        return Err(state.reject(ValidationError::MissingStatusFields));
    };

    let status = ComplaintStatus::parse_known(&new_status)
        .ok_or_else(|| state.reject(ValidationError::UnknownStatus { status: new_status }))?;
    let pnr = Pnr::parse(&raw_pnr).map_err(|e| state.reject(e))?;

    state
        .flow
        .change_status(&pnr, &complaint_id, &status)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(json!({
        "message": "Complaint status updated successfully",
        "pnr": pnr,
        "complaintId": complaint_id,
        "newStatus": status,
    })))
}
