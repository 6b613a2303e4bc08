//! Cloud Firestore REST v1 客户端
//!
//! 只覆盖投诉集合用到的四种操作：追加（arrayUnion 合并写）、读取单个文档、
//! 分页列出集合、带 updateMask 的字段覆盖。
//!
//! Firestore 的文档字段是带类型标注的 JSON（`stringValue` / `mapValue` / `arrayValue` …），
//! 与普通 JSON 的互转在 [`encode_value`] / [`decode_value`] 中完成。

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::clients::google_auth::GoogleAuth;
use crate::config::Config;
use crate::error::{AppError, AppResult, UpstreamError};

const SERVICE: &str = "firestore";
const BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

/// 一个文档：文档 ID + 解码后的字段 + 最后更新时间
#[derive(Debug, Clone, PartialEq)]
pub struct FirestoreDocument {
    pub id: String,
    pub fields: Value,
    pub update_time: Option<String>,
}

/// Firestore 客户端
pub struct FirestoreClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    auth: Arc<GoogleAuth>,
}

impl FirestoreClient {
    /// 创建新的 Firestore 客户端
    pub fn new(config: &Config, auth: Arc<GoogleAuth>) -> Self {
        Self::with_base_url(config, BASE_URL, auth)
    }

    /// 使用自定义端点（例如本地模拟器）
    pub fn with_base_url(config: &Config, base_url: impl Into<String>, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            project_id: config.google_project_id.clone(),
            database: config.firestore_database.clone(),
            auth,
        }
    }

    /// 文档的资源名：`projects/{p}/databases/{d}/documents/{collection}/{id}`
    pub fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}/{}",
            self.project_id, self.database, collection, id
        )
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url, self.project_id, self.database
        )
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.project_id.is_empty() {
            return Err(AppError::upstream_not_configured(SERVICE, "GOOGLE_PROJECT_ID"));
        }
        Ok(())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        self.auth
            .authorize(builder)
            .await?
            .send()
            .await
            .map_err(|e| AppError::upstream_request_failed(SERVICE, e))
    }

    /// `documents:commit` 请求体：对数组字段做 appendMissingElements，文档不存在时创建
    pub fn commit_body(&self, collection: &str, id: &str, field: &str, element: &Value) -> Value {
        json!({
            "writes": [{
                "update": {
                    "name": self.document_name(collection, id),
                    "fields": {}
                },
                "updateMask": { "fieldPaths": [] },
                "updateTransforms": [{
                    "fieldPath": field,
                    "appendMissingElements": { "values": [encode_value(element)] }
                }]
            }]
        })
    }

    /// 向数组字段追加元素，文档不存在时自动创建（等价于 `set(arrayUnion, {merge: true})`）
    pub async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        element: &Value,
    ) -> AppResult<()> {
        self.ensure_configured()?;

        let url = format!("{}:commit", self.documents_url());
        debug!("Firestore commit: {}/{}", collection, id);

        let body = self.commit_body(collection, id, field, element);
        let response = self.send(self.http.post(&url).json(&body)).await?;
        check_status(response).await?;
        Ok(())
    }

    /// 读取单个文档，不存在时返回 `None`
    pub async fn get_document(&self, collection: &str, id: &str) -> AppResult<Option<FirestoreDocument>> {
        self.ensure_configured()?;

        let url = format!("{}/{}/{}", self.documents_url(), collection, id);
        let response = self.send(self.http.get(&url)).await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        let body = check_status(response).await?;
        Ok(Some(parse_document(&body)))
    }

    /// 列出集合中的全部文档（自动翻页）
    pub async fn list_documents(&self, collection: &str) -> AppResult<Vec<FirestoreDocument>> {
        self.ensure_configured()?;

        let url = format!("{}/{}", self.documents_url(), collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let body = check_status(self.send(request).await?).await?;
            let (page, next) = parse_page(&body);
            documents.extend(page);

            page_token = next;
            if page_token.is_none() {
                break;
            }
        }

        debug!("Firestore 列出 {} 个文档: {}", documents.len(), collection);
        Ok(documents)
    }

    /// 覆盖单个字段（PATCH + updateMask）
    ///
    /// 给出 `update_time` 时要求文档自该时间起未被修改，否则只要求文档存在。
    pub async fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
        update_time: Option<&str>,
    ) -> AppResult<()> {
        self.ensure_configured()?;

        let url = format!("{}/{}/{}", self.documents_url(), collection, id);
        let body = json!({ "fields": { field: encode_value(value) } });

        let request = self
            .http
            .patch(&url)
            .query(&patch_query(field, update_time))
            .json(&body);
        check_status(self.send(request).await?).await?;
        Ok(())
    }
}

/// PATCH 的查询参数：更新掩码 + 前置条件
pub fn patch_query<'a>(field: &'a str, update_time: Option<&'a str>) -> [(&'static str, &'a str); 2] {
    let precondition = match update_time {
        Some(time) => ("currentDocument.updateTime", time),
        None => ("currentDocument.exists", "true"),
    };
    [("updateMask.fieldPaths", field), precondition]
}

/// 解析单个文档资源
pub fn parse_document(item: &Value) -> FirestoreDocument {
    let id = item
        .get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .unwrap_or_default()
        .to_string();
    FirestoreDocument {
        id,
        fields: decode_fields(item.get("fields")),
        update_time: item
            .get("updateTime")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// 解析列表接口的一页：文档 + 下一页令牌
pub fn parse_page(body: &Value) -> (Vec<FirestoreDocument>, Option<String>) {
    let documents = body
        .get("documents")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_document).collect())
        .unwrap_or_default();
    let next = body
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    (documents, next)
}

/// 前置条件不满足（文档已被并发修改）
pub fn is_precondition_failed(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Upstream(UpstreamError::BadResponse { service: SERVICE, status, body })
            if (*status == 400 || *status == 409) && body.contains("FAILED_PRECONDITION")
    )
}

async fn check_status(response: reqwest::Response) -> AppResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::upstream_request_failed(SERVICE, e))?;

    if !status.is_success() {
        return Err(AppError::upstream_bad_response(SERVICE, status.as_u16(), text));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| AppError::upstream_parse_failed(SERVICE, e))
}

// ========== 值编解码 ==========

/// 普通 JSON → Firestore 带类型值
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // int64 在 REST 中以字符串传输
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Firestore 带类型值 → 普通 JSON
pub fn decode_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };

    if let Some(s) = map.get("stringValue") {
        return s.clone();
    }
    if let Some(b) = map.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = map.get("integerValue") {
        return match i {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        };
    }
    if let Some(d) = map.get("doubleValue") {
        return d.clone();
    }
    if let Some(t) = map.get("timestampValue") {
        return t.clone();
    }
    if let Some(r) = map.get("referenceValue") {
        return r.clone();
    }
    if let Some(array) = map.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(inner) = map.get("mapValue") {
        return decode_fields(inner.get("fields"));
    }
    Value::Null
}

/// 解码文档的 `fields` 对象
pub fn decode_fields(fields: Option<&Value>) -> Value {
    let decoded: Map<String, Value> = fields
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), decode_value(v)))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(decoded)
}
