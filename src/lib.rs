//! # Rail Madad
//!
//! 铁路投诉后端：乘客上传照片并填写 PNR，服务自动生成投诉描述并存档
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 托管服务的 HTTP 客户端，只负责收发请求
//! - `FirestoreClient` - 文档存储（Firestore REST）
//! - `GcsClient` - 对象存储（Cloud Storage 上传）
//! - `HuggingFaceClient` - 图片描述 / 图片分类
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条投诉
//! - `ComplaintStore` - 按 PNR 追加、查询、修改投诉
//! - `ImageStorage` - 保存图片并返回地址
//! - `ImageAnalyzer` - 图片描述与分类（失败时降级）
//! - `LlmService` - 生成投诉描述
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条投诉"的完整处理流程
//! - `ComplaintCtx` - 上下文封装（PNR + 请求编号）
//! - `ComplaintFlow` - 流程编排（上传 ∥ 分析 → 评估 → LLM → 保存）
//!
//! ### ④ 接口层（API）
//! - `api/` - axum 路由、multipart 解析、错误到 HTTP 响应的映射
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{router, AppState};
pub use app::{build_flow, App};
pub use config::{Backend, Config};
pub use error::{AppError, AppResult};
pub use models::{Complaint, ComplaintStatus, Pnr};
pub use workflow::{ComplaintCtx, ComplaintFlow};
