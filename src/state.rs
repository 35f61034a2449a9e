use crate::api::{TransportFailure, UploadReceipt};
use crate::conversation::ConversationLog;
use crate::models::{
    ConnectionStatus, Document, IngestState, IngestStatus, Message, Snapshot, UploadState, UploadStatus,
    UploadView,
};
use uuid::Uuid;

pub const READY_NOTICE: &str = "I have processed your document. What would you like to know about it?";
pub const QUERY_ERROR_NOTICE: &str = "Error connecting to server. Please check if the backend is running.";

const UPLOAD_OK_STATUS: &str = "File uploaded. Now process it to build the knowledge base.";
const UPLOAD_FAILED_STATUS: &str = "Upload failed. Is the backend running?";
const INGEST_STARTED_STATUS: &str = "Processing document...";
const INGEST_FAILED_STATUS: &str = "Processing failed. Please try again.";

/// Bumped on every document selection. Results tagged with an older value are stale.
pub type Generation = u64;

/// Why a command was refused. Refusals happen before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("no document selected")]
    NoDocumentSelected,
    #[error("the selected document is already uploaded")]
    AlreadyUploaded,
    #[error("an upload is already in progress")]
    UploadInProgress,
    #[error("upload the document before processing it")]
    UploadNotComplete,
    #[error("the document is already being processed")]
    IngestInProgress,
    #[error("the knowledge base is not ready; upload and process a document first")]
    KnowledgeBaseNotReady,
    #[error("cannot send an empty question")]
    EmptyQuery,
    #[error("still waiting for the previous answer")]
    QueryInFlight,
}

// Emitted after each state change so a presentation layer can re-render
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    UploadChanged(UploadStatus),
    IngestChanged(IngestStatus),
    ConnectionChanged(ConnectionStatus),
    MessageAppended(Message),
    AwaitingChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEvent {
    Select,
    Start,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEvent {
    Reset,
    Start,
    Succeeded,
    Failed,
}

impl UploadStatus {
    /// Upload transition table. `None` marks an illegal transition.
    pub fn on(self, event: UploadEvent) -> Option<Self> {
        use UploadStatus::*;
        match (self, event) {
            (_, UploadEvent::Select) => Some(Idle),
            (Idle | Error, UploadEvent::Start) => Some(Uploading),
            (Uploading, UploadEvent::Succeeded) => Some(Success),
            (Uploading, UploadEvent::Failed) => Some(Error),
            _ => None,
        }
    }
}

impl IngestStatus {
    /// Ingest transition table. Whether the upload stage allows `Start` is
    /// checked separately, see [`WorkflowState::begin_ingest`].
    pub fn on(self, event: IngestEvent) -> Option<Self> {
        use IngestStatus::*;
        match (self, event) {
            (_, IngestEvent::Reset) => Some(Idle),
            (Idle | Error | Success, IngestEvent::Start) => Some(Ingesting),
            (Ingesting, IngestEvent::Succeeded) => Some(Success),
            (Ingesting, IngestEvent::Failed) => Some(Error),
            _ => None,
        }
    }
}

/// Cross-machine rule: what an upload event forces on the ingest machine.
pub fn cascade(event: UploadEvent) -> Option<IngestEvent> {
    match event {
        UploadEvent::Select => Some(IngestEvent::Reset),
        UploadEvent::Start | UploadEvent::Succeeded | UploadEvent::Failed => None,
    }
}

/// The single owner of upload, ingest and connection state plus the
/// conversation log for one session.
#[derive(Debug)]
pub struct WorkflowState {
    session_id: Uuid,
    upload: UploadState,
    ingest: IngestState,
    connection: ConnectionStatus,
    log: ConversationLog,
    awaiting_response: bool,
    status_message: Option<String>,
    input: String,
    generation: Generation,
    pending: Vec<WorkflowEvent>,
}

impl WorkflowState {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            upload: UploadState::default(),
            ingest: IngestState::default(),
            connection: ConnectionStatus::default(),
            log: ConversationLog::seeded(),
            awaiting_response: false,
            status_message: None,
            input: String::new(),
            generation: 0,
            pending: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn upload(&self) -> &UploadState {
        &self.upload
    }

    pub fn ingest(&self) -> &IngestState {
        &self.ingest
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Drains the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<WorkflowEvent> {
        std::mem::take(&mut self.pending)
    }

    // --- transitions ---

    fn apply_upload(&mut self, event: UploadEvent) {
        match self.upload.status.on(event) {
            Some(next) => {
                if next != self.upload.status {
                    self.upload.status = next;
                    self.pending.push(WorkflowEvent::UploadChanged(next));
                }
                if let Some(ingest_event) = cascade(event) {
                    self.apply_ingest(ingest_event);
                }
            }
            None => log::warn!(
                "[{}] Ignoring upload event {:?} in state {:?}",
                self.session_id,
                event,
                self.upload.status
            ),
        }
        self.check_invariants();
    }

    fn apply_ingest(&mut self, event: IngestEvent) {
        match self.ingest.status.on(event) {
            Some(next) => {
                if event == IngestEvent::Reset {
                    self.ingest.chunk_count = None;
                    self.ingest.error = None;
                }
                if next != self.ingest.status {
                    self.ingest.status = next;
                    self.pending.push(WorkflowEvent::IngestChanged(next));
                }
            }
            None => log::warn!(
                "[{}] Ignoring ingest event {:?} in state {:?}",
                self.session_id,
                event,
                self.ingest.status
            ),
        }
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.upload.status == UploadStatus::Success || self.ingest.status == IngestStatus::Idle,
            "ingest must be idle unless the upload succeeded (upload={:?}, ingest={:?})",
            self.upload.status,
            self.ingest.status
        );
    }

    fn append(&mut self, message: Message) -> Message {
        let appended = self.log.append(message).clone();
        self.pending.push(WorkflowEvent::MessageAppended(appended.clone()));
        appended
    }

    fn set_awaiting(&mut self, awaiting: bool) {
        if self.awaiting_response != awaiting {
            self.awaiting_response = awaiting;
            self.pending.push(WorkflowEvent::AwaitingChanged(awaiting));
        }
    }

    /// Replaces the selected document. Any earlier upload or ingestion no
    /// longer applies, and results still in flight for it become stale.
    pub fn select_document(&mut self, document: Document) -> Generation {
        log::info!(
            "[{}] Selected {} ({} bytes)",
            self.session_id,
            document.name,
            document.size()
        );
        self.generation += 1;
        self.upload.document = Some(document);
        self.upload.error = None;
        self.status_message = None;
        self.apply_upload(UploadEvent::Select);
        self.generation
    }

    pub fn begin_upload(&mut self) -> Result<(Document, Generation), WorkflowError> {
        let document = self.upload.document.clone().ok_or(WorkflowError::NoDocumentSelected)?;
        match self.upload.status {
            UploadStatus::Uploading => return Err(WorkflowError::UploadInProgress),
            UploadStatus::Success => return Err(WorkflowError::AlreadyUploaded),
            UploadStatus::Idle | UploadStatus::Error => {}
        }
        self.upload.error = None;
        self.apply_upload(UploadEvent::Start);
        Ok((document, self.generation))
    }

    /// Applies an upload result. Returns false when the result is stale.
    pub fn finish_upload(
        &mut self,
        generation: Generation,
        result: Result<UploadReceipt, TransportFailure>,
    ) -> bool {
        if generation != self.generation {
            log::warn!(
                "[{}] Discarding upload result for generation {} (current {})",
                self.session_id,
                generation,
                self.generation
            );
            return false;
        }
        match result {
            Ok(receipt) => {
                log::info!(
                    "[{}] Upload accepted: {}",
                    self.session_id,
                    receipt.message.as_deref().unwrap_or("no message")
                );
                self.apply_upload(UploadEvent::Succeeded);
                self.status_message = Some(UPLOAD_OK_STATUS.to_string());
            }
            Err(failure) => {
                log::error!("[{}] Upload failed: {}", self.session_id, failure);
                self.apply_upload(UploadEvent::Failed);
                self.upload.error = Some(failure.to_string());
                self.status_message = Some(UPLOAD_FAILED_STATUS.to_string());
            }
        }
        true
    }

    pub fn begin_ingest(&mut self) -> Result<Generation, WorkflowError> {
        if self.upload.status != UploadStatus::Success {
            return Err(WorkflowError::UploadNotComplete);
        }
        if self.ingest.status == IngestStatus::Ingesting {
            return Err(WorkflowError::IngestInProgress);
        }
        self.ingest.chunk_count = None;
        self.ingest.error = None;
        self.apply_ingest(IngestEvent::Start);
        self.status_message = Some(INGEST_STARTED_STATUS.to_string());
        Ok(self.generation)
    }

    /// Applies an ingestion result. Returns false when the result is stale.
    pub fn finish_ingest(&mut self, generation: Generation, result: Result<usize, TransportFailure>) -> bool {
        if generation != self.generation {
            log::warn!(
                "[{}] Discarding ingest result for generation {} (current {})",
                self.session_id,
                generation,
                self.generation
            );
            return false;
        }
        match result {
            Ok(chunk_count) => {
                log::info!("[{}] Knowledge base built with {} chunks", self.session_id, chunk_count);
                self.apply_ingest(IngestEvent::Succeeded);
                self.ingest.chunk_count = Some(chunk_count);
                self.status_message = Some(format!("Knowledge base updated with {chunk_count} chunks."));
                self.append(Message::assistant(READY_NOTICE));
            }
            Err(failure) => {
                log::error!("[{}] Ingestion failed: {}", self.session_id, failure);
                self.apply_ingest(IngestEvent::Failed);
                self.ingest.error = Some(failure.to_string());
                self.status_message = Some(INGEST_FAILED_STATUS.to_string());
            }
        }
        true
    }

    /// Records the user's turn and marks a response as pending.
    /// Returns the trimmed text to send.
    pub fn begin_query(&mut self, text: &str) -> Result<String, WorkflowError> {
        if self.ingest.status != IngestStatus::Success {
            return Err(WorkflowError::KnowledgeBaseNotReady);
        }
        if self.awaiting_response {
            return Err(WorkflowError::QueryInFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkflowError::EmptyQuery);
        }
        self.append(Message::user(text));
        self.input.clear();
        self.set_awaiting(true);
        Ok(text.to_string())
    }

    /// Appends the answer, or the error notice in its place.
    pub fn finish_query(&mut self, result: Result<String, TransportFailure>) -> Message {
        let reply = match result {
            Ok(answer) => Message::assistant(answer),
            Err(failure) => {
                log::error!("[{}] Query failed: {}", self.session_id, failure);
                Message::assistant(QUERY_ERROR_NOTICE)
            }
        };
        let appended = self.append(reply);
        self.set_awaiting(false);
        appended
    }

    /// Last write wins. Returns whether the value changed.
    pub fn set_connection(&mut self, status: ConnectionStatus) -> bool {
        if self.connection == status {
            return false;
        }
        log::info!("[{}] Backend is now {:?}", self.session_id, status);
        self.connection = status;
        self.pending.push(WorkflowEvent::ConnectionChanged(status));
        true
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    // --- enablement predicates ---

    pub fn can_upload(&self) -> bool {
        self.upload.document.is_some()
            && matches!(self.upload.status, UploadStatus::Idle | UploadStatus::Error)
    }

    pub fn can_ingest(&self) -> bool {
        self.upload.status == UploadStatus::Success && self.ingest.status != IngestStatus::Ingesting
    }

    pub fn can_submit(&self) -> bool {
        self.ingest.status == IngestStatus::Success && !self.awaiting_response && !self.input.trim().is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            session_id: self.session_id,
            upload: UploadView {
                status: self.upload.status,
                document: self.upload.document.as_ref().map(Document::info),
                error: self.upload.error.clone(),
            },
            ingest: self.ingest.clone(),
            connection: self.connection,
            messages: self.log.messages().to_vec(),
            awaiting_response: self.awaiting_response,
            status_message: self.status_message.clone(),
            input: self.input.clone(),
            can_upload: self.can_upload(),
            can_ingest: self.can_ingest(),
            can_submit: self.can_submit(),
        }
    }
}
