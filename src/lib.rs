// Client-side orchestrator for a document question-answering backend:
// upload a document, have the backend ingest it, then ask questions about it.

// Declare the modules
pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod models;
pub mod monitor;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{BackendApi, HttpBackend, TransportFailure, UploadReceipt};
pub use commands::Workflow;
pub use config::ClientConfig;
pub use models::{ConnectionStatus, Document, IngestStatus, Message, Role, Snapshot, UploadStatus};
pub use session::Session;
pub use state::{WorkflowError, WorkflowEvent};

use anyhow::Context;

/// Entry point of the `docqa` binary. An optional first argument names a
/// JSON config file; otherwise the configuration comes from the environment.
pub async fn run() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::from_json_file(&path)?,
        None => ClientConfig::from_env().context("Invalid DOCQA_* environment configuration")?,
    };

    let session = Session::connect(&config)?;
    cli::run_terminal(session).await
}
