use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use rail_madad::clients::ImageLabel;
use rail_madad::config::{Backend, Config};
use rail_madad::error::{AppError, AppResult, LlmError};
use rail_madad::models::ImageUpload;
use rail_madad::services::{
    CaptionOutcome, ComplaintStore, DescriptionRequest, DescriptionWriter, ImageAnalyzer,
    ImageStorage, InMemoryComplaintStore, InMemoryImageStorage,
};
use rail_madad::workflow::{ComplaintFlow, DESCRIPTION_FALLBACK};
use rail_madad::{router, AppState, Pnr};

const BOUNDARY: &str = "rail-madad-test-boundary";
const PNR: &str = "1234567890";

// ========== 测试替身 ==========

struct StubAnalyzer {
    caption: CaptionOutcome,
    labels: Vec<ImageLabel>,
}

#[async_trait]
impl ImageAnalyzer for StubAnalyzer {
    async fn caption(&self, _image: &ImageUpload) -> CaptionOutcome {
        self.caption.clone()
    }

    async fn classify(&self, _image: &ImageUpload) -> Vec<ImageLabel> {
        self.labels.clone()
    }
}

/// `None` 表示模拟 LLM 不可用
struct StubWriter(Option<String>);

#[async_trait]
impl DescriptionWriter for StubWriter {
    async fn describe(&self, request: &DescriptionRequest<'_>) -> AppResult<String> {
        assert!(!request.subject.is_empty());
        self.0.clone().ok_or(AppError::Llm(LlmError::NotConfigured))
    }
}

struct FailingStorage;

#[async_trait]
impl ImageStorage for FailingStorage {
    async fn store(&self, _image: &ImageUpload) -> AppResult<String> {
        Err(AppError::upstream_bad_response("Cloud Storage", 403, "forbidden"))
    }
}

struct TestApp {
    config: Config,
    state: AppState,
    store: Arc<InMemoryComplaintStore>,
    storage: Arc<InMemoryImageStorage>,
}

impl TestApp {
    fn new() -> Self {
        Self::build(
            Config {
                backend: Backend::Memory,
                ..Config::default()
            },
            StubAnalyzer {
                caption: CaptionOutcome::Generated("a cracked train window".into()),
                labels: vec![ImageLabel {
                    label: "broken window".into(),
                    score: 0.7,
                }],
            },
            StubWriter(Some("The window next to my seat is cracked.".into())),
            None,
        )
    }

    fn build(
        config: Config,
        analyzer: StubAnalyzer,
        writer: StubWriter,
        storage_override: Option<Arc<dyn ImageStorage>>,
    ) -> Self {
        let store = Arc::new(InMemoryComplaintStore::new());
        let storage = Arc::new(InMemoryImageStorage::new());
        let flow = ComplaintFlow::new(
            storage_override.unwrap_or_else(|| storage.clone() as Arc<dyn ImageStorage>),
            Arc::new(analyzer),
            Arc::new(writer),
            store.clone(),
        );
        let state = AppState::new(flow, &config);
        Self {
            config,
            state,
            store,
            storage,
        }
    }

    fn router(&self) -> Router {
        router(self.state.clone(), &self.config)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn submit(&self, form: &MultipartForm) -> (StatusCode, Value) {
        self.send(form.request()).await
    }
}

// ========== multipart 构造 ==========

#[derive(Default)]
struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    fn complaint(pnr: &str, subject: &str) -> Self {
        Self::default()
            .text("pnr", pnr)
            .text("subject", subject)
            .file("image", "window.jpg", "image/jpeg", b"\xff\xd8\xff\xe0fake-jpeg")
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn request(&self) -> Request<Body> {
        let mut body = self.body.clone();
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri("/submit-complaint")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }
}

// ========== 基础路由 ==========

#[tokio::test]
async fn test_root_and_health() {
    let app = TestApp::new();

    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Hello World!".into()));

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "Complaint service is running");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/submit-complaint")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

// ========== 提交投诉 ==========

#[tokio::test]
async fn test_submit_complaint_stores_document() {
    let app = TestApp::new();
    let form = MultipartForm::complaint(PNR, "Broken window").text("station", " Itarsi ");

    let (status, body) = app.submit(&form).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Complaint submitted successfully");
    assert_eq!(body["pnr"], PNR);

    let data = &body["complaintData"];
    assert_eq!(body["complaintId"], data["id"]);
    assert_eq!(data["subject"], "Broken window");
    assert_eq!(data["station"], "Itarsi");
    assert_eq!(data["status"], "Pending");
    assert_eq!(data["queryGenerated"], "The window next to my seat is cracked.");
    let image_url = data["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with("memory://images/"));
    assert!(image_url.ends_with("-window.jpg"));
    assert!(data["submittedAt"].as_str().unwrap().ends_with('Z'));

    // 图片与文档都已保存
    let (content_type, _) = app.storage.get(image_url).await.unwrap();
    assert_eq!(content_type, "image/jpeg");
    let stored = app
        .store
        .find_by_pnr(&Pnr::parse(PNR).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, data["id"].as_str().unwrap());
}

#[tokio::test]
async fn test_submissions_append_to_same_pnr() {
    let app = TestApp::new();
    app.submit(&MultipartForm::complaint(PNR, "Fan not working")).await;
    app.submit(&MultipartForm::complaint(PNR, "No water")).await;

    let (status, body) = app.get(&format!("/complaints/{PNR}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Complaints retrieved successfully");
    assert_eq!(body["totalComplaints"], 2);
    let subjects: Vec<_> = body["complaints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["subject"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(subjects, ["Fan not working", "No water"]);
    assert_eq!(app.storage.len().await, 2);
}

#[tokio::test]
async fn test_llm_failure_falls_back_to_caption() {
    let config = Config {
        backend: Backend::Memory,
        ..Config::default()
    };
    let app = TestApp::build(
        config,
        StubAnalyzer {
            caption: CaptionOutcome::Generated("a dirty toilet".into()),
            labels: vec![],
        },
        StubWriter(None),
        None,
    );

    let (status, body) = app.submit(&MultipartForm::complaint(PNR, "Unclean")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complaintData"]["queryGenerated"], "a dirty toilet");
}

#[tokio::test]
async fn test_llm_and_caption_failure_uses_canned_description() {
    let config = Config {
        backend: Backend::Memory,
        ..Config::default()
    };
    let app = TestApp::build(
        config,
        StubAnalyzer {
            caption: CaptionOutcome::Fallback(
                "Unable to generate caption - authentication failed".into(),
            ),
            labels: vec![],
        },
        StubWriter(None),
        None,
    );

    let (status, body) = app.submit(&MultipartForm::complaint(PNR, "Unclean")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complaintData"]["queryGenerated"], DESCRIPTION_FALLBACK);
}

#[tokio::test]
async fn test_storage_failure_is_internal_error() {
    let app = TestApp::build(
        Config {
            backend: Backend::Memory,
            ..Config::default()
        },
        StubAnalyzer {
            caption: CaptionOutcome::Generated("x".into()),
            labels: vec![],
        },
        StubWriter(Some("y".into())),
        Some(Arc::new(FailingStorage)),
    );

    let (status, body) = app.submit(&MultipartForm::complaint(PNR, "Broken seat")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Internal server error", "details": "Please try again later" })
    );
    assert!(app
        .store
        .find_by_pnr(&Pnr::parse(PNR).unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_storage_failure_details_in_development() {
    let app = TestApp::build(
        Config {
            backend: Backend::Memory,
            environment: "development".into(),
            ..Config::default()
        },
        StubAnalyzer {
            caption: CaptionOutcome::Generated("x".into()),
            labels: vec![],
        },
        StubWriter(Some("y".into())),
        Some(Arc::new(FailingStorage)),
    );

    let (status, body) = app.submit(&MultipartForm::complaint(PNR, "Broken seat")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("403"));
}

// ========== 提交校验 ==========

async fn expect_bad_request(app: &TestApp, form: MultipartForm, message: &str) {
    let (status, body) = app.submit(&form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], message);
}

#[tokio::test]
async fn test_invalid_pnr_is_rejected() {
    let app = TestApp::new();
    for pnr in ["12345", "12345678901", "12345abcde"] {
        expect_bad_request(
            &app,
            MultipartForm::complaint(pnr, "Broken"),
            "PNR must be exactly 10 digits",
        )
        .await;
    }
    assert!(app.store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let app = TestApp::new();

    expect_bad_request(
        &app,
        MultipartForm::default().text("pnr", PNR).text("subject", "Broken"),
        "No image file provided",
    )
    .await;

    expect_bad_request(
        &app,
        MultipartForm::default()
            .text("pnr", PNR)
            .file("image", "a.png", "image/png", b"png"),
        "PNR and subject are required",
    )
    .await;
}

#[tokio::test]
async fn test_non_multipart_body_reports_missing_image() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json("/submit-complaint", json!({ "pnr": PNR, "subject": "Broken" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No image file provided" }));

    let (status, body) = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/submit-complaint")
                .body(Body::from("pnr=1234567890"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file provided");
}

#[tokio::test]
async fn test_invalid_file_type_is_rejected() {
    let app = TestApp::new();
    let form = MultipartForm::default()
        .text("pnr", PNR)
        .text("subject", "Broken")
        .file("image", "notes.pdf", "application/pdf", b"%PDF-1.4");

    expect_bad_request(
        &app,
        form,
        "Invalid file type. Please upload a valid image file (JPEG, PNG, GIF, BMP, WebP, or TIFF).",
    )
    .await;
}

#[tokio::test]
async fn test_unexpected_file_field_is_rejected() {
    let app = TestApp::new();
    let form = MultipartForm::default()
        .text("pnr", PNR)
        .text("subject", "Broken")
        .file("photo", "a.jpg", "image/jpeg", b"jpg");

    expect_bad_request(
        &app,
        form,
        "Unexpected file field. Please upload image in the correct field.",
    )
    .await;
}

#[tokio::test]
async fn test_oversized_image_is_rejected() {
    let app = TestApp::build(
        Config {
            backend: Backend::Memory,
            max_image_bytes: 1024,
            ..Config::default()
        },
        StubAnalyzer {
            caption: CaptionOutcome::Generated("x".into()),
            labels: vec![],
        },
        StubWriter(Some("y".into())),
        None,
    );
    let form = MultipartForm::default()
        .text("pnr", PNR)
        .text("subject", "Broken")
        .file("image", "big.jpg", "image/jpeg", &vec![0u8; 2048]);

    let (status, body) = app.submit(&form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File too large. Maximum size allowed is 1KB.");
    assert_eq!(app.storage.len().await, 0);
}

// ========== 查询 ==========

#[tokio::test]
async fn test_get_complaints_not_found_and_invalid() {
    let app = TestApp::new();

    let (status, body) = app.get("/complaints/9999999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "error": "No complaints found for this PNR",
            "pnr": "9999999999",
            "complaints": [],
        })
    );

    let (status, body) = app.get("/complaints/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "PNR must be exactly 10 digits");
}

// ========== 管理端 ==========

#[tokio::test]
async fn test_admin_pending_list_and_status_change() {
    let app = TestApp::new();

    let (_, body) = app.get("/get-complaints").await;
    assert_eq!(body, json!({ "message": "No complaints found" }));

    let (_, submitted) = app.submit(&MultipartForm::complaint(PNR, "Broken window")).await;
    let complaint_id = submitted["complaintId"].as_str().unwrap().to_string();

    let (status, body) = app.get("/get-complaints").await;
    assert_eq!(status, StatusCode::OK);
    let pending = body["pendingComplaints"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["pnr"], PNR);
    assert_eq!(pending[0]["complaintId"], complaint_id.as_str());
    assert_eq!(pending[0]["subject"], "Broken window");

    let (status, body) = app
        .post_json(
            "/change-status",
            json!({ "pnr": PNR, "complaintId": complaint_id, "newStatus": "Resolved" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({
            "message": "Complaint status updated successfully",
            "pnr": PNR,
            "complaintId": complaint_id,
            "newStatus": "Resolved",
        })
    );

    let (_, body) = app.get("/get-complaints").await;
    assert_eq!(body, json!({ "message": "No pending complaints found" }));

    let (_, body) = app.get(&format!("/complaints/{PNR}")).await;
    assert_eq!(body["complaints"][0]["status"], "Resolved");
}

#[tokio::test]
async fn test_change_status_rejections() {
    let app = TestApp::new();
    let (_, submitted) = app.submit(&MultipartForm::complaint(PNR, "Broken window")).await;
    let complaint_id = submitted["complaintId"].as_str().unwrap().to_string();

    let (status, body) = app
        .post_json("/change-status", json!({ "pnr": PNR, "newStatus": "Resolved" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, _) = app
        .post_json(
            "/change-status",
            json!({ "pnr": PNR, "complaintId": complaint_id, "newStatus": "Closed" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json(
            "/change-status",
            json!({ "pnr": PNR, "complaintId": "missing", "newStatus": "Resolved" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Complaint not found");

    let (status, body) = app
        .post_json(
            "/change-status",
            json!({ "pnr": "5555555555", "complaintId": complaint_id, "newStatus": "Resolved" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Complaint not found");
}
