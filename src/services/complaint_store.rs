//! 投诉存储 - 业务能力层
//!
//! 只负责"按 PNR 读写投诉"能力。每个 PNR 一个文档，文档内 `complaints` 为只追加的数组。
//!
//! ## 实现
//! - [`FirestoreComplaintStore`]：生产环境，数据全部交给 Firestore
//! - [`InMemoryComplaintStore`]：本地开发与测试

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clients::firestore_client::is_precondition_failed;
use crate::clients::FirestoreClient;
use crate::error::{AppError, AppResult, NotFoundError};
use crate::models::{Complaint, ComplaintStatus, Pnr};

/// 集合名
pub const COLLECTION: &str = "complaints";
/// 文档内存放投诉列表的字段
pub const COMPLAINTS_FIELD: &str = "complaints";
/// 修改状态时遇到并发写入的最大尝试次数
const MAX_STATUS_ATTEMPTS: u32 = 3;

/// 一个 PNR 文档
#[derive(Debug, Clone, PartialEq)]
pub struct PnrDocument {
    pub pnr: String,
    pub complaints: Vec<Complaint>,
}

/// 投诉存储
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// 追加一条投诉，文档不存在时创建
    async fn append(&self, pnr: &Pnr, complaint: &Complaint) -> AppResult<()>;

    /// 读取 PNR 下的全部投诉，文档不存在时返回 `None`
    async fn find_by_pnr(&self, pnr: &Pnr) -> AppResult<Option<Vec<Complaint>>>;

    /// 列出所有 PNR 文档
    async fn list_all(&self) -> AppResult<Vec<PnrDocument>>;

    /// 修改某条投诉的状态
    ///
    /// 文档或投诉不存在时返回 [`NotFoundError::Complaint`]。
    async fn update_status(
        &self,
        pnr: &Pnr,
        complaint_id: &str,
        status: &ComplaintStatus,
    ) -> AppResult<()>;
}

fn complaint_not_found(pnr: &Pnr, complaint_id: &str) -> AppError {
    NotFoundError::Complaint {
        pnr: pnr.to_string(),
        complaint_id: complaint_id.to_string(),
    }
    .into()
}

// ========== 内存实现 ==========

/// 进程内存储
#[derive(Default)]
pub struct InMemoryComplaintStore {
    documents: RwLock<BTreeMap<String, Vec<Complaint>>>,
}

impl InMemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComplaintStore for InMemoryComplaintStore {
    async fn append(&self, pnr: &Pnr, complaint: &Complaint) -> AppResult<()> {
        let mut documents = self.documents.write().await;
        let entries = documents.entry(pnr.to_string()).or_default();
        // arrayUnion 语义：完全相同的元素不重复追加
        if !entries.contains(complaint) {
            entries.push(complaint.clone());
        }
        Ok(())
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> AppResult<Option<Vec<Complaint>>> {
        Ok(self.documents.read().await.get(pnr.as_str()).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<PnrDocument>> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .map(|(pnr, complaints)| PnrDocument {
                pnr: pnr.clone(),
                complaints: complaints.clone(),
            })
            .collect())
    }

    async fn update_status(
        &self,
        pnr: &Pnr,
        complaint_id: &str,
        status: &ComplaintStatus,
    ) -> AppResult<()> {
        let mut documents = self.documents.write().await;
        let complaint = documents
            .get_mut(pnr.as_str())
            .and_then(|entries| entries.iter_mut().find(|c| c.id == complaint_id))
            .ok_or_else(|| complaint_not_found(pnr, complaint_id))?;
        complaint.status = status.clone();
        Ok(())
    }
}

// ========== Firestore 实现 ==========

/// Firestore 存储
pub struct FirestoreComplaintStore {
    client: FirestoreClient,
}

impl FirestoreComplaintStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

/// 仅在文档被并发修改且还有剩余次数时重试
fn should_retry_status(err: &AppError, attempt: u32) -> bool {
    is_precondition_failed(err) && attempt < MAX_STATUS_ATTEMPTS
}

/// 从文档字段中取出投诉列表，跳过无法解析的条目
fn complaints_from_fields(pnr: &str, fields: &Value) -> Vec<Complaint> {
    let Some(items) = fields.get(COMPLAINTS_FIELD).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Complaint>(item.clone()) {
            Ok(complaint) => Some(complaint),
            Err(e) => {
                warn!("PNR {} 中存在无法解析的投诉记录: {}", pnr, e);
                None
            }
        })
        .collect()
}

/// 在原始 JSON 上修改状态，保留未知字段；找不到时返回 `false`
fn set_status_in_place(items: &mut [Value], complaint_id: &str, status: &ComplaintStatus) -> bool {
    let mut found = false;
    for item in items.iter_mut() {
        if item.get("id").and_then(Value::as_str) == Some(complaint_id) {
            item["status"] = Value::String(status.to_string());
            found = true;
        }
    }
    found
}

#[async_trait]
impl ComplaintStore for FirestoreComplaintStore {
    async fn append(&self, pnr: &Pnr, complaint: &Complaint) -> AppResult<()> {
        let element = serde_json::to_value(complaint)
            .map_err(|e| AppError::Other(format!("序列化投诉失败: {}", e)))?;
        self.client
            .array_union(COLLECTION, pnr.as_str(), COMPLAINTS_FIELD, &element)
            .await
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> AppResult<Option<Vec<Complaint>>> {
        let document = self.client.get_document(COLLECTION, pnr.as_str()).await?;
        Ok(document.map(|doc| complaints_from_fields(pnr.as_str(), &doc.fields)))
    }

    async fn list_all(&self) -> AppResult<Vec<PnrDocument>> {
        let documents = self.client.list_documents(COLLECTION).await?;
        Ok(documents
            .into_iter()
            .map(|doc| PnrDocument {
                complaints: complaints_from_fields(&doc.id, &doc.fields),
                pnr: doc.id,
            })
            .collect())
    }

    async fn update_status(
        &self,
        pnr: &Pnr,
        complaint_id: &str,
        status: &ComplaintStatus,
    ) -> AppResult<()> {
        let mut attempt = 1;
        loop {
            let document = self
                .client
                .get_document(COLLECTION, pnr.as_str())
                .await?
                .ok_or_else(|| complaint_not_found(pnr, complaint_id))?;

            let mut items = document
                .fields
                .get(COMPLAINTS_FIELD)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if !set_status_in_place(&mut items, complaint_id, status) {
                return Err(complaint_not_found(pnr, complaint_id));
            }

            debug!("更新投诉状态: {} / {} -> {}", pnr, complaint_id, status);
            let result = self
                .client
                .update_field(
                    COLLECTION,
                    pnr.as_str(),
                    COMPLAINTS_FIELD,
                    &Value::Array(items),
                    document.update_time.as_deref(),
                )
                .await;

            match result {
                Err(e) if should_retry_status(&e, attempt) => {
                    warn!("⚠️ PNR {} 文档已被并发修改，重新读取 (第 {} 次)", pnr, attempt);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
