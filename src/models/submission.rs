use crate::error::{AppResult, ValidationError};
use crate::models::{ImageUpload, Pnr};

/// 从 multipart 表单中读出的原始字段
#[derive(Debug, Clone, Default)]
pub struct ComplaintForm {
    pub pnr: Option<String>,
    pub subject: Option<String>,
    pub station: Option<String>,
    pub image: Option<ImageUpload>,
}

/// 校验通过的投诉提交
#[derive(Debug, Clone)]
pub struct ComplaintSubmission {
    pub pnr: Pnr,
    pub subject: String,
    pub station: Option<String>,
    pub image: ImageUpload,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ComplaintForm {
    /// 校验顺序：图片 → PNR/主题是否填写 → PNR 格式
    pub fn validate(self) -> AppResult<ComplaintSubmission> {
        let image = self.image.ok_or(ValidationError::NoImageProvided)?;

        let (Some(pnr), Some(subject)) = (non_blank(self.pnr), non_blank(self.subject)) else {
            return Err(ValidationError::MissingPnrOrSubject.into());
        };

        let pnr = Pnr::parse(&pnr)?;

        Ok(ComplaintSubmission {
            pnr,
            subject,
            station: non_blank(self.station).map(|s| s.trim().to_string()),
            image,
        })
    }
}
