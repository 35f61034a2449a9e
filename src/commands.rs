// Commands exposed to the presentation layer

use crate::api::BackendApi;
use crate::models::{ConnectionStatus, Document, Message, Snapshot};
use crate::state::{WorkflowError, WorkflowEvent, WorkflowState};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

/// Cloneable handle to one session's workflow.
///
/// Every command validates its preconditions under the state lock, releases
/// the lock for the backend call, then re-acquires it to apply the result.
/// Refused commands never reach the backend.
#[derive(Clone)]
pub struct Workflow {
    session_id: Uuid,
    state: Arc<Mutex<WorkflowState>>,
    backend: Arc<dyn BackendApi>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl Workflow {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        let session_id = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        log::info!("[{}] Session created", session_id);
        Self {
            session_id,
            state: Arc::new(Mutex::new(WorkflowState::new(session_id))),
            backend,
            events,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub(crate) fn backend(&self) -> Arc<dyn BackendApi> {
        self.backend.clone()
    }

    /// Receives every state change made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }

    // Broadcasts what the last transition produced; no receivers is fine
    fn publish(&self, state: &mut MutexGuard<'_, WorkflowState>) {
        for event in state.take_events() {
            let _ = self.events.send(event);
        }
    }

    pub async fn select_document(&self, document: Document) {
        let mut state = self.state.lock().await;
        state.select_document(document);
        self.publish(&mut state);
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.state.lock().await.set_input(text);
    }

    pub async fn upload(&self) -> Result<(), WorkflowError> {
        log::info!("[{}] Upload requested", self.session_id);
        let (document, generation) = {
            let mut state = self.state.lock().await;
            let started = state.begin_upload();
            self.publish(&mut state);
            started.inspect_err(|e| log::warn!("[{}] Upload refused: {}", self.session_id, e))?
        };

        let result = self.backend.upload(&document).await;

        let mut state = self.state.lock().await;
        state.finish_upload(generation, result);
        self.publish(&mut state);
        Ok(())
    }

    pub async fn ingest(&self) -> Result<(), WorkflowError> {
        log::info!("[{}] Ingestion requested", self.session_id);
        let generation = {
            let mut state = self.state.lock().await;
            let started = state.begin_ingest();
            self.publish(&mut state);
            started.inspect_err(|e| log::warn!("[{}] Ingestion refused: {}", self.session_id, e))?
        };

        let result = self.backend.ingest().await;

        let mut state = self.state.lock().await;
        state.finish_ingest(generation, result);
        self.publish(&mut state);
        Ok(())
    }

    /// Submits a question and waits for the reply, which is also appended to
    /// the log. A transport failure still yields a reply: the error notice.
    pub async fn submit_query(&self, text: &str) -> Result<Message, WorkflowError> {
        log::info!("[{}] Query submitted", self.session_id);
        let question = {
            let mut state = self.state.lock().await;
            let started = state.begin_query(text);
            self.publish(&mut state);
            started.inspect_err(|e| log::warn!("[{}] Query refused: {}", self.session_id, e))?
        };

        let result = self.backend.query(&question).await;

        let mut state = self.state.lock().await;
        let reply = state.finish_query(result);
        self.publish(&mut state);
        Ok(reply)
    }

    /// Submits whatever is in the input buffer.
    pub async fn submit_input(&self) -> Result<Message, WorkflowError> {
        let draft = self.state.lock().await.input().to_string();
        self.submit_query(&draft).await
    }

    // Only the liveness monitor writes the connection status
    pub(crate) async fn set_connection(&self, status: ConnectionStatus) {
        let mut state = self.state.lock().await;
        state.set_connection(status);
        self.publish(&mut state);
    }
}
