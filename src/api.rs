use crate::config::ClientConfig;
use crate::models::Document;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Every way a backend call can fail, normalized at the transport boundary.
///
/// The workflow treats all variants alike; the classification only feeds
/// logging and the failure detail shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned HTTP {status}{}", suffix(.detail))]
    HttpStatus { status: u16, detail: Option<String> },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("backend reported status \"{status}\"{}", suffix(.message))]
    Rejected { status: String, message: Option<String> },
}

fn suffix(text: &Option<String>) -> String {
    text.as_deref().map(|t| format!(": {t}")).unwrap_or_default()
}

impl TransportFailure {
    /// The server-supplied explanation, when the backend gave one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { detail, .. } => detail.as_deref(),
            Self::Rejected { message, .. } => message.as_deref(),
            Self::Network(_) | Self::Malformed(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

// What the backend says about an accepted upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub filename: Option<String>,
    pub message: Option<String>,
}

// Trait defining the four remote operations the workflow depends on
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Never fails: any error, non-2xx response or timeout means "not alive".
    async fn check_health(&self) -> bool;

    async fn upload(&self, document: &Document) -> Result<UploadReceipt, TransportFailure>;

    /// Ingests the last uploaded document server-side; returns the chunk count.
    async fn ingest(&self) -> Result<usize, TransportFailure>;

    async fn query(&self, text: &str) -> Result<String, TransportFailure>;
}

// --- Wire formats ---

#[derive(Deserialize, Debug)]
struct UploadResponseBody {
    status: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct IngestResponseBody {
    status: String,
    #[serde(default)]
    chunks_count: Option<usize>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize, Debug)]
struct ChatRequestBody<'a> {
    message: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponseBody {
    answer: String,
}

// Error payloads: FastAPI-style `detail` (string or structured) or a plain `message`
#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => parsed.message,
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportFailure> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let detail = error_detail(&body);
        log::error!("Backend request failed with status {}: {:?}", status, detail);
        return Err(TransportFailure::HttpStatus {
            status: status.as_u16(),
            detail,
        });
    }
    serde_json::from_slice(&body).map_err(|e| TransportFailure::Malformed(e.to_string()))
}

// --- HTTP implementation ---

pub struct HttpBackend {
    client: Client,
    base_url: String,
    health_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            health_timeout: Duration::from_secs(ClientConfig::default().health_timeout_secs),
        }
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            health_timeout: config.health_timeout(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn file_part(document: &Document) -> Result<multipart::Part, TransportFailure> {
        let content_type = match document.content_type.parse::<mime_guess::Mime>() {
            Ok(_) => document.content_type.as_str(),
            Err(_) => "application/octet-stream",
        };
        let part = multipart::Part::bytes(document.bytes.to_vec())
            .file_name(document.name.clone())
            .mime_str(content_type)?;
        Ok(part)
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn check_health(&self) -> bool {
        let url = self.endpoint("health");
        match self.client.get(&url).timeout(self.health_timeout).send().await {
            Ok(response) => {
                log::debug!("Health check {} -> {}", url, response.status());
                response.status().is_success()
            }
            Err(e) => {
                log::debug!("Health check {} failed: {}", url, e);
                false
            }
        }
    }

    async fn upload(&self, document: &Document) -> Result<UploadReceipt, TransportFailure> {
        let url = self.endpoint("upload");
        log::info!("Uploading {} ({} bytes) to {}", document.name, document.size(), url);

        let form = multipart::Form::new().part("file", Self::file_part(document)?);
        let response = self.client.post(&url).multipart(form).send().await?;
        let body: UploadResponseBody = read_json(response).await?;

        if body.status == "success" {
            Ok(UploadReceipt {
                filename: body.filename,
                message: body.message,
            })
        } else {
            Err(TransportFailure::Rejected {
                status: body.status,
                message: body.message,
            })
        }
    }

    async fn ingest(&self) -> Result<usize, TransportFailure> {
        let url = self.endpoint("ingest");
        log::info!("Requesting ingestion at {}", url);

        let response = self.client.post(&url).send().await?;
        let body: IngestResponseBody = read_json(response).await?;

        match (body.status.as_str(), body.chunks_count) {
            ("ok", Some(count)) => Ok(count),
            ("ok", None) => Err(TransportFailure::Malformed(
                "ingest response is missing chunks_count".to_string(),
            )),
            _ => Err(TransportFailure::Rejected {
                status: body.status,
                message: body.message,
            }),
        }
    }

    async fn query(&self, text: &str) -> Result<String, TransportFailure> {
        let url = self.endpoint("chat");
        log::info!("Sending query ({} chars) to {}", text.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequestBody { message: text })
            .send()
            .await?;
        let body: ChatResponseBody = read_json(response).await?;

        if body.answer.trim().is_empty() {
            return Err(TransportFailure::Malformed("answer is empty".to_string()));
        }
        Ok(body.answer)
    }
}
