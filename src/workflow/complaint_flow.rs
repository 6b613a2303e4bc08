//! 投诉处理流程 - 流程层
//!
//! 核心职责：定义"一条投诉"的完整处理流程
//!
//! 流程顺序：
//! 1. 上传图片 ∥ 图片描述 ∥ 图片分类（并发）
//! 2. 根据分类标签评估损坏情况
//! 3. LLM 生成投诉描述（失败时回退为图片描述或兜底文本）
//! 4. 追加到 PNR 文档

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{AppResult, NotFoundError};
use crate::models::{collect_pending, Complaint, ComplaintStatus, ComplaintSubmission, PendingComplaint, Pnr};
use crate::services::{
    assess_labels, CaptionOutcome, ComplaintStore, DamageAssessment, DescriptionRequest,
    DescriptionWriter, ImageAnalyzer, ImageStorage,
};
use crate::utils::logging::truncate_text;
use crate::workflow::complaint_ctx::ComplaintCtx;

/// LLM 与图片描述都不可用时的投诉描述
pub const DESCRIPTION_FALLBACK: &str = "Unable to generate complaint description at this time";

/// 管理端待处理列表查询结果
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOverview {
    /// 集合中没有任何文档
    NoComplaints,
    /// 有文档但没有待处理投诉
    NonePending,
    Pending(Vec<PendingComplaint>),
}

/// 投诉处理流程
///
/// - 编排完整的投诉提交流程
/// - 决定何时上传、何时分析、何时兜底
/// - 不持有任何请求级状态
/// - 只依赖业务能力（services）
pub struct ComplaintFlow {
    storage: Arc<dyn ImageStorage>,
    analyzer: Arc<dyn ImageAnalyzer>,
    writer: Arc<dyn DescriptionWriter>,
    store: Arc<dyn ComplaintStore>,
}

impl ComplaintFlow {
    /// 创建新的投诉处理流程
    pub fn new(
        storage: Arc<dyn ImageStorage>,
        analyzer: Arc<dyn ImageAnalyzer>,
        writer: Arc<dyn DescriptionWriter>,
        store: Arc<dyn ComplaintStore>,
    ) -> Self {
        Self {
            storage,
            analyzer,
            writer,
            store,
        }
    }

    /// 提交一条投诉，返回写入的记录
    pub async fn submit(&self, submission: ComplaintSubmission) -> AppResult<Complaint> {
        let ctx = ComplaintCtx::new(submission.pnr.as_str());
        let image = &submission.image;

        info!(
            "{} 📥 收到投诉: 主题「{}」, 图片 {} ({}, {})",
            ctx,
            truncate_text(&submission.subject, 40),
            image.file_name,
            image.content_type,
            image.size_mb()
        );

        // ========== 步骤 1: 上传 ∥ 描述 ∥ 分类 ==========
        let (uploaded, caption, labels) = futures::join!(
            self.storage.store(image),
            self.analyzer.caption(image),
            self.analyzer.classify(image),
        );

        let image_url = uploaded.map_err(|e| {
            error!("{} ❌ 图片上传失败: {}", ctx, e);
            e
        })?;
        info!("{} ✓ 图片已保存: {}", ctx, image_url);

        // ========== 步骤 2: 损坏评估 ==========
        let assessment = assess_labels(&labels);
        if !assessment.is_empty() {
            info!(
                "{} 📊 铁路相关度 {:.1}%, 损坏可能性 {:.1}%",
                ctx,
                assessment.railway_score * 100.0,
                assessment.damage_score * 100.0
            );
        }

        // ========== 步骤 3: 生成描述 ==========
        let query_generated = self
            .write_description(&ctx, &submission, &caption, &assessment, &image_url)
            .await;

        // ========== 步骤 4: 保存 ==========
        let ComplaintSubmission {
            pnr,
            subject,
            station,
            ..
        } = submission;
        let complaint = Complaint::new(subject, station, image_url, query_generated);

        self.store.append(&pnr, &complaint).await.map_err(|e| {
            error!("{} ❌ 保存投诉失败: {}", ctx, e);
            e
        })?;

        info!("{} ✅ 投诉已保存，ID: {}", ctx, complaint.id);
        Ok(complaint)
    }

    async fn write_description(
        &self,
        ctx: &ComplaintCtx,
        submission: &ComplaintSubmission,
        caption: &CaptionOutcome,
        assessment: &DamageAssessment,
        image_url: &str,
    ) -> String {
        let request = DescriptionRequest {
            subject: &submission.subject,
            station: submission.station.as_deref(),
            caption: caption.generated(),
            assessment,
            image_url: Some(image_url),
        };

        match self.writer.describe(&request).await {
            Ok(description) => {
                info!("{} 🤖 描述已生成: {}", ctx, truncate_text(&description, 80));
                description
            }
            Err(e) => {
                let fallback = caption.generated().unwrap_or(DESCRIPTION_FALLBACK);
                warn!("{} ⚠️ 描述生成失败，回退为: {} ({})", ctx, fallback, e);
                fallback.to_string()
            }
        }
    }

    /// 查询 PNR 下的全部投诉
    pub async fn complaints_for(&self, pnr: &Pnr) -> AppResult<Vec<Complaint>> {
        let complaints = self
            .store
            .find_by_pnr(pnr)
            .await?
            .ok_or_else(|| NotFoundError::Pnr {
                pnr: pnr.to_string(),
            })?;
        info!("🔍 PNR {} 共 {} 条投诉", pnr, complaints.len());
        Ok(complaints)
    }

    /// 汇总所有待处理投诉
    pub async fn pending(&self) -> AppResult<PendingOverview> {
        let documents = self.store.list_all().await?;
        if documents.is_empty() {
            return Ok(PendingOverview::NoComplaints);
        }

        let pending = collect_pending(
            documents
                .iter()
                .map(|doc| (doc.pnr.as_str(), doc.complaints.as_slice())),
        );
        info!("📋 {} 个 PNR 文档，{} 条待处理投诉", documents.len(), pending.len());

        if pending.is_empty() {
            Ok(PendingOverview::NonePending)
        } else {
            Ok(PendingOverview::Pending(pending))
        }
    }

    /// 修改投诉状态
    pub async fn change_status(
        &self,
        pnr: &Pnr,
        complaint_id: &str,
        status: &ComplaintStatus,
    ) -> AppResult<()> {
        self.store.update_status(pnr, complaint_id, status).await?;
        info!("✓ 投诉状态已更新: {} / {} -> {}", pnr, complaint_id, status);
        Ok(())
    }
}
