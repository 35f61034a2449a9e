// Fake document QA backend served by axum on an ephemeral port

#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

// A canned reply: status code plus raw body
pub type Reply = (StatusCode, String);

pub struct FakeBackend {
    healthy: AtomicBool,
    health_delay: Mutex<Option<Duration>>,
    uploads: Mutex<Vec<ReceivedFile>>,
    questions: Mutex<Vec<String>>,
    upload_reply: Mutex<Option<Reply>>,
    ingest_reply: Mutex<Option<Reply>>,
    chat_reply: Mutex<Option<Reply>>,
    chunks_count: Mutex<usize>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            health_delay: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
            upload_reply: Mutex::new(None),
            ingest_reply: Mutex::new(None),
            chat_reply: Mutex::new(None),
            chunks_count: Mutex::new(42),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn delay_health(&self, delay: Duration) {
        *self.health_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_chunks_count(&self, count: usize) {
        *self.chunks_count.lock().unwrap() = count;
    }

    pub fn reply_to_upload(&self, status: StatusCode, body: &str) {
        *self.upload_reply.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn reply_to_ingest(&self, status: StatusCode, body: &str) {
        *self.ingest_reply.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn reply_to_chat(&self, status: StatusCode, body: &str) {
        *self.chat_reply.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn uploads(&self) -> Vec<ReceivedFile> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

fn json_reply((status, body): Reply) -> impl IntoResponse {
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

async fn health(State(fake): State<Arc<FakeBackend>>) -> StatusCode {
    let delay = *fake.health_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if fake.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn upload(State(fake): State<Arc<FakeBackend>>, mut multipart: Multipart) -> impl IntoResponse {
    let mut received = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap();
        received = Some(ReceivedFile {
            field: name,
            file_name,
            content_type,
            size: data.len(),
        });
    }
    let Some(file) = received else {
        return json_reply((StatusCode::UNPROCESSABLE_ENTITY, json!({"detail": "file missing"}).to_string()));
    };
    let canned = fake.upload_reply.lock().unwrap().clone();
    let file_name = file.file_name.clone();
    let is_pdf = file.content_type.as_deref() == Some("application/pdf");
    fake.uploads.lock().unwrap().push(file);

    if let Some(reply) = canned {
        return json_reply(reply);
    }
    if !is_pdf {
        return json_reply((StatusCode::BAD_REQUEST, json!({"detail": "File must be a PDF"}).to_string()));
    }
    json_reply((
        StatusCode::OK,
        json!({
            "status": "success",
            "filename": file_name,
            "message": "File uploaded. Run /ingest to process it."
        })
        .to_string(),
    ))
}

async fn ingest(State(fake): State<Arc<FakeBackend>>) -> impl IntoResponse {
    if let Some(reply) = fake.ingest_reply.lock().unwrap().clone() {
        return json_reply(reply);
    }
    if fake.uploads.lock().unwrap().is_empty() {
        return json_reply((
            StatusCode::OK,
            json!({"status": "error", "message": "No PDF found. Please upload one first using /upload"}).to_string(),
        ));
    }
    let count = *fake.chunks_count.lock().unwrap();
    json_reply((StatusCode::OK, json!({"status": "ok", "chunks_count": count}).to_string()))
}

#[derive(Deserialize)]
struct ChatIn {
    message: String,
}

async fn chat(State(fake): State<Arc<FakeBackend>>, Json(payload): Json<ChatIn>) -> impl IntoResponse {
    fake.questions.lock().unwrap().push(payload.message.clone());
    if let Some(reply) = fake.chat_reply.lock().unwrap().clone() {
        return json_reply(reply);
    }
    json_reply((
        StatusCode::OK,
        json!({"answer": format!("echo: {}", payload.message)}).to_string(),
    ))
}

/// Serves `fake` on 127.0.0.1 and returns its base URL.
pub async fn serve(fake: Arc<FakeBackend>) -> String {
    let app = Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/ingest", post(ingest))
        .route("/chat", post(chat))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
