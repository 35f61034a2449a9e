// Scripted backend for unit tests

use crate::api::{BackendApi, TransportFailure, UploadReceipt};
use crate::models::Document;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    alive: AtomicBool,
    health_checks: AtomicUsize,
    uploads: Mutex<VecDeque<Result<UploadReceipt, TransportFailure>>>,
    ingests: Mutex<VecDeque<Result<usize, TransportFailure>>>,
    answers: Mutex<VecDeque<Result<String, TransportFailure>>>,
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn push_upload(&self, result: Result<UploadReceipt, TransportFailure>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn push_ingest(&self, result: Result<usize, TransportFailure>) {
        self.ingests.lock().unwrap().push_back(result);
    }

    pub fn push_answer(&self, result: Result<String, TransportFailure>) {
        self.answers.lock().unwrap().push_back(result);
    }

    /// Holds every later call to `op` until the returned gate is notified once per call.
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(op, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.starts_with(op)).count()
    }

    /// Yields until `n` calls to `op` have reached the backend.
    pub async fn wait_for(&self, op: &str, n: usize) {
        for _ in 0..10_000 {
            if self.count(op) >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("backend never saw {n} {op} call(s); calls: {:?}", self.calls());
    }

    async fn enter(&self, call: String, op: &'static str) {
        self.calls.lock().unwrap().push(call);
        let gate = self.gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl BackendApi for ScriptedBackend {
    async fn check_health(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        self.alive.load(Ordering::SeqCst)
    }

    async fn upload(&self, document: &Document) -> Result<UploadReceipt, TransportFailure> {
        self.enter(format!("upload {}", document.name), "upload").await;
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(UploadReceipt::default()))
    }

    async fn ingest(&self) -> Result<usize, TransportFailure> {
        self.enter("ingest".to_string(), "ingest").await;
        self.ingests.lock().unwrap().pop_front().unwrap_or(Ok(42))
    }

    async fn query(&self, text: &str) -> Result<String, TransportFailure> {
        self.enter(format!("query {text}"), "query").await;
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("answer to: {text}")))
    }
}
