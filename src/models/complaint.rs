use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 投诉处理状态
///
/// 旧数据里可能存在管理员写入的任意状态字符串，反序列化时原样保留在 `Other` 中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComplaintStatus {
    Pending,
    Resolved,
    Other(String),
}

impl ComplaintStatus {
    /// 只接受管理端可以设置的状态
    pub fn parse_known(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(ComplaintStatus::Pending),
            "Resolved" => Some(ComplaintStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Other(s) => s,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ComplaintStatus::Pending)
    }
}

impl From<String> for ComplaintStatus {
    fn from(value: String) -> Self {
        Self::parse_known(&value).unwrap_or(ComplaintStatus::Other(value))
    }
}

impl From<ComplaintStatus> for String {
    fn from(status: ComplaintStatus) -> Self {
        match status {
            ComplaintStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条投诉记录，存放在以 PNR 为 ID 的文档的 `complaints` 数组中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub image_url: String,
    pub query_generated: String,
    pub status: ComplaintStatus,
    pub submitted_at: String,
}

impl Complaint {
    /// 创建一条新的待处理投诉（新 UUID，当前时间）
    pub fn new(
        subject: impl Into<String>,
        station: Option<String>,
        image_url: impl Into<String>,
        query_generated: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject: subject.into(),
            station,
            image_url: image_url.into(),
            query_generated: query_generated.into(),
            status: ComplaintStatus::Pending,
            submitted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// 管理端待处理列表中的一项：投诉字段 + 所属 PNR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingComplaint {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub pnr: String,
    pub complaint_id: String,
}

impl PendingComplaint {
    pub fn new(pnr: impl Into<String>, complaint: Complaint) -> Self {
        Self {
            pnr: pnr.into(),
            complaint_id: complaint.id.clone(),
            complaint,
        }
    }
}

/// 从若干 PNR 文档中筛选出待处理投诉
pub fn collect_pending<'a>(
    documents: impl IntoIterator<Item = (&'a str, &'a [Complaint])>,
) -> Vec<PendingComplaint> {
    documents
        .into_iter()
        .flat_map(|(pnr, complaints)| {
            complaints
                .iter()
                .filter(|c| c.status.is_pending())
                .map(move |c| PendingComplaint::new(pnr, c.clone()))
        })
        .collect()
}
