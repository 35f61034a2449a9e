use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

// Who authored a message in the conversation
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

// Represents a single message in the conversation log
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        debug_assert!(!text.trim().is_empty(), "messages must carry text");
        Self {
            role,
            text,
            timestamp: Utc::now(),
        }
    }
}

// A document chosen for upload: name, payload and the content type sent with it
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Path has no file name: {}", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read document {}", path.display()))?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        log::debug!("Loaded document {} ({} bytes, {})", name, bytes.len(), content_type);
        Ok(Self::new(name, bytes, content_type))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            name: self.name.clone(),
            size: self.size(),
        }
    }
}

// Display metadata of the selected document (the payload itself is never exposed)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: String,
    pub size: u64,
}

impl DocumentInfo {
    pub fn size_mib(&self) -> f64 {
        self.size as f64 / 1024.0 / 1024.0
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    #[default]
    Idle,
    Ingesting,
    Success,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn from_liveness(alive: bool) -> Self {
        if alive {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

// Upload stage of the workflow
#[derive(Clone, Debug, Default)]
pub struct UploadState {
    pub status: UploadStatus,
    pub document: Option<Document>,
    // Failure text of the last attempt, if it failed
    pub error: Option<String>,
}

// Knowledge-base build stage of the workflow
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestState {
    pub status: IngestStatus,
    pub chunk_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Serializable view of the upload stage
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadView {
    pub status: UploadStatus,
    pub document: Option<DocumentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Everything a presentation layer needs to render the session
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub session_id: Uuid,
    pub upload: UploadView,
    pub ingest: IngestState,
    pub connection: ConnectionStatus,
    pub messages: Vec<Message>,
    pub awaiting_response: bool,
    pub status_message: Option<String>,
    pub input: String,
    pub can_upload: bool,
    pub can_ingest: bool,
    pub can_submit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_as_lowercase_tags() {
        assert_eq!(serde_json::to_string(&UploadStatus::Uploading).unwrap(), "\"uploading\"");
        assert_eq!(serde_json::to_string(&IngestStatus::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::to_string(&ConnectionStatus::Disconnected).unwrap(), "\"disconnected\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn document_info_reports_size_in_mib() {
        let doc = Document::new("report.pdf", vec![0u8; 2 * 1024 * 1024], "application/pdf");
        let info = doc.info();
        assert_eq!(info.name, "report.pdf");
        assert_eq!(info.size, 2 * 1024 * 1024);
        assert!((info.size_mib() - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_guesses_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let doc = Document::from_path(&path).await.unwrap();
        assert_eq!(doc.name, "notes.pdf");
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(doc.size(), 13);
    }

    #[tokio::test]
    async fn from_path_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::from_path(dir.path().join("missing.pdf")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read document"));
    }
}
