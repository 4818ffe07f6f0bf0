//! Drives the REST router end to end with fake generation and page ports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_lib::adapters::InMemorySessionStore;
use api_lib::config::Config;
use api_lib::web::{self, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use study_path_core::{
    blocks, emit, Attachment, EnrichedTopic, GenerationRequest, GenerationService, PageRecord,
    PageSubmissionService, Pipeline, PortError, PortResult, SessionRepository, StageInvoker,
};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "study-path-boundary";

//=========================================================================================
// Fakes
//=========================================================================================

type Responder = dyn Fn(&GenerationRequest<'_>) -> PortResult<Vec<String>> + Send + Sync;

struct FakeBackend {
    attachments: Mutex<Vec<Option<Attachment>>>,
    respond: Box<Responder>,
}

impl FakeBackend {
    fn new(
        respond: impl Fn(&GenerationRequest<'_>) -> PortResult<Vec<String>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            attachments: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }
}

#[async_trait]
impl GenerationService for FakeBackend {
    async fn generate(&self, request: GenerationRequest<'_>) -> PortResult<Vec<String>> {
        self.attachments
            .lock()
            .unwrap()
            .push(request.attachment.cloned());
        (self.respond)(&request)
    }
}

/// Removes one session from the store while the course curator runs, as a
/// concurrent profile submission would.
struct ClearingBackend {
    sessions: Arc<InMemorySessionStore>,
    doomed: Mutex<Option<Uuid>>,
}

#[async_trait]
impl GenerationService for ClearingBackend {
    async fn generate(&self, request: GenerationRequest<'_>) -> PortResult<Vec<String>> {
        if request.instruction.starts_with("You are a course curator") {
            let doomed = self.doomed.lock().unwrap().take();
            if let Some(id) = doomed {
                self.sessions.remove(id).await?;
            }
        }
        cooperative(&request)
    }
}

#[derive(Default)]
struct FakePages {
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl PageSubmissionService for FakePages {
    async fn create_page(&self, record: &PageRecord) -> PortResult<()> {
        self.titles
            .lock()
            .unwrap()
            .push(record.title().unwrap_or_default());
        Ok(())
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn config() -> Config {
    Config::from_lookup(|name| match name {
        "GOOGLE_API_KEY" => Some("g-key".to_string()),
        "NOTION_TOKEN" => Some("secret".to_string()),
        "PAGE_ID" => Some("parent-page".to_string()),
        _ => None,
    })
    .unwrap()
}

fn app(backend: Arc<dyn GenerationService>, pages: Arc<FakePages>) -> Router {
    app_with_store(backend, pages, Arc::new(InMemorySessionStore::new()))
}

fn app_with_store(
    backend: Arc<dyn GenerationService>,
    pages: Arc<FakePages>,
    sessions: Arc<InMemorySessionStore>,
) -> Router {
    let state = AppState {
        config: Arc::new(config()),
        sessions,
        pipeline: Pipeline::new(StageInvoker::new(backend, Duration::from_secs(5)), pages),
    };
    web::router(Arc::new(state))
}

fn plan_reply() -> String {
    format!(
        "Your study path:\n{}",
        emit(&json!({"topics": [
            {"title": "SQL", "subtopics": [{"title": "Joins"}], "duration": "1 month"},
            {"title": "Spark", "subtopics": [{"title": "RDDs"}], "duration": "2 months"}
        ]}))
    )
}

fn curated_reply() -> String {
    emit(&json!([
        {"title": "SQL", "subtopics": [{"title": "Joins"}], "duration": "1 month",
         "courses": [{"title": "SQL 101", "link": "https://courses.example/sql", "price": 0}]},
        {"title": "Spark", "subtopics": [{"title": "RDDs"}], "duration": "2 months",
         "courses": [{"title": "Spark in Depth", "link": "https://courses.example/spark", "price": "R$ 120"}]}
    ]))
}

/// Answers each stage the way a cooperative model would.
fn cooperative(request: &GenerationRequest<'_>) -> PortResult<Vec<String>> {
    if request.instruction.starts_with("You are a study path architect") {
        return Ok(vec![plan_reply()]);
    }
    if request.instruction.starts_with("You are a course curator") {
        return Ok(vec![curated_reply()]);
    }
    let topic_json = request.input_text.trim_start_matches("Topic:\n");
    let topic: EnrichedTopic = serde_json::from_str(topic_json)
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    let record = blocks::page_record_for(&topic);
    Ok(vec![emit(
        &json!({"properties": record.properties, "children": record.children}),
    )])
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"prior_experience\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

const PROFILE: &[(&str, &str)] = &[
    ("field_of_study", "Data Engineering"),
    ("budget", "R$500"),
    ("available_time", "3 months"),
];

fn profile_request(body: Vec<u8>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/sessions")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send(app, profile_request(multipart(PROFILE, None), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn profile_to_published_pages() {
    let pages = Arc::new(FakePages::default());
    let app = app(FakeBackend::new(cooperative), pages.clone());

    let response = app
        .clone()
        .oneshot(profile_request(multipart(PROFILE, None), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let created: Value = serde_json::from_slice(&bytes).unwrap();
    let session_id = created["session_id"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("study_session={session_id}")));
    assert_eq!(created["plan"].as_array().map(Vec::len), Some(2));

    let (status, curated) = send(&app, post(&format!("/sessions/{session_id}/courses"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(curated["enriched_plan"][0]["title"], "SQL");
    assert_eq!(curated["enriched_plan"][0]["courses"][0]["price"], "0");

    let (status, published) = send(&app, post(&format!("/sessions/{session_id}/pages"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["parent_page_id"], "parent-page");
    assert_eq!(published["submitted"], json!(["SQL", "Spark"]));
    assert_eq!(published["failed"], json!([]));
    assert_eq!(*pages.titles.lock().unwrap(), vec!["SQL", "Spark"]);

    let (status, session) = send(&app, get(&format!("/sessions/{session_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["field_of_study"], "Data Engineering");
    assert_eq!(session["enriched_plan"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn uploaded_document_reaches_the_plan_stage() {
    let backend = FakeBackend::new(cooperative);
    let app = app(backend.clone(), Arc::default());

    let mut fields = PROFILE.to_vec();
    fields.push(("objective", "ship a data pipeline"));
    let (status, created) = send(
        &app,
        profile_request(multipart(&fields, Some(("cv.pdf", b"%PDF-1.7"))), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let attachments = backend.attachments.lock().unwrap().clone();
    let attachment = attachments[0].as_ref().unwrap();
    assert_eq!(attachment.file_name, "cv.pdf");
    assert_eq!(attachment.data, b"%PDF-1.7");

    let session_id = created["session_id"].as_str().unwrap();
    let (_, session) = send(&app, get(&format!("/sessions/{session_id}"))).await;
    assert_eq!(session["attachment"]["size_bytes"], 8);
    assert_eq!(session["objectives"], json!(["ship a data pipeline"]));
}

#[tokio::test]
async fn incomplete_profile_is_rejected() {
    let app = app(FakeBackend::new(cooperative), Arc::default());
    let body = multipart(&[("field_of_study", "Law"), ("budget", "R$500")], None);

    let (status, body) = send(&app, profile_request(body, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("available_time"));
}

#[tokio::test]
async fn plan_without_json_block_sends_the_user_back() {
    let backend = FakeBackend::new(|request| {
        if request.instruction.starts_with("You are a study path architect") {
            Ok(vec!["Start with SQL, then learn Spark.".to_string()])
        } else {
            Ok(vec!["I could not find any courses.".to_string()])
        }
    });
    let app = app(backend, Arc::default());
    let session_id = create_session(&app).await;

    let (status, body) = send(&app, post(&format!("/sessions/{session_id}/courses"))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["redirect"], "/");

    let (_, session) = send(&app, get(&format!("/sessions/{session_id}"))).await;
    assert_eq!(session["raw_plan"], "Start with SQL, then learn Spark.\n");
    assert_eq!(session["enriched_plan"], Value::Null);
}

#[tokio::test]
async fn publishing_before_curation_sends_the_user_back() {
    let app = app(FakeBackend::new(cooperative), Arc::default());
    let session_id = create_session(&app).await;

    let (status, body) = send(&app, post(&format!("/sessions/{session_id}/pages"))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["redirect"], "/");
}

#[tokio::test]
async fn backend_failure_is_reported_as_bad_gateway() {
    let backend = FakeBackend::new(|_| {
        Err(PortError::Upstream {
            status: 503,
            message: "overloaded".to_string(),
        })
    });
    let app = app(backend, Arc::default());

    let (status, body) = send(&app, profile_request(multipart(PROFILE, None), None)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.get("redirect").is_none());
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = app(FakeBackend::new(cooperative), Arc::default());

    let (status, body) = send(
        &app,
        post("/sessions/6f2c3c34-5d7e-4a39-9d57-2f0cbe5f7a11/courses"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["redirect"], "/");
}

#[tokio::test]
async fn new_profile_clears_the_previous_session() {
    let app = app(FakeBackend::new(cooperative), Arc::default());
    let first = create_session(&app).await;

    let cookie = format!("study_session={first}");
    let (status, second) = send(
        &app,
        profile_request(multipart(PROFILE, None), Some(&cookie)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(second["session_id"], first.as_str());

    let (status, _) = send(&app, get(&format!("/sessions/{first}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn curation_does_not_revive_a_cleared_session() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let backend = Arc::new(ClearingBackend {
        sessions: sessions.clone(),
        doomed: Mutex::new(None),
    });
    let app = app_with_store(backend.clone(), Arc::default(), sessions);
    let session_id = create_session(&app).await;
    *backend.doomed.lock().unwrap() = Some(Uuid::parse_str(&session_id).unwrap());

    let (status, body) = send(&app, post(&format!("/sessions/{session_id}/courses"))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["redirect"], "/");
    let (status, _) = send(&app, get(&format!("/sessions/{session_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = app(FakeBackend::new(cooperative), Arc::default());

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, doc) = send(&app, get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/sessions/{session_id}/pages"].is_object());
}
