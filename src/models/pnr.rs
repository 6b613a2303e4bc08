//! PNR（Passenger Name Record）
//!
//! 10 位数字的订票记录号，作为投诉文档的主键。

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ValidationError};

static PNR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}$").expect("PNR 正则无效"));

/// 校验通过的 PNR
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pnr(String);

impl Pnr {
    /// 解析并校验 PNR，必须恰好是 10 位数字
    pub fn parse(raw: &str) -> AppResult<Self> {
        Ok(Self::try_from(raw.to_string())?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Pnr {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        // `\d` 在 regex 中包含全角等 Unicode 数字，这里额外限定 ASCII
        if PNR_PATTERN.is_match(&value) && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidPnr)
        }
    }
}

impl From<Pnr> for String {
    fn from(pnr: Pnr) -> Self {
        pnr.0
    }
}

impl fmt::Display for Pnr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
