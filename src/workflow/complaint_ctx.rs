//! 投诉处理上下文
//!
//! 封装"正在处理哪个 PNR 的哪一次提交"这一信息，仅用于日志

use std::fmt::Display;

use uuid::Uuid;

/// 投诉处理上下文
#[derive(Debug, Clone)]
pub struct ComplaintCtx {
    /// PNR
    pub pnr: String,

    /// 本次提交的短编号
    pub request_id: String,
}

impl ComplaintCtx {
    /// 创建新的上下文，自动生成短编号
    pub fn new(pnr: impl Into<String>) -> Self {
        let mut request_id = Uuid::new_v4().simple().to_string();
        request_id.truncate(8);
        Self {
            pnr: pnr.into(),
            request_id,
        }
    }
}

impl Display for ComplaintCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[PNR {} #{}]", self.pnr, self.request_id)
    }
}
