// Line-oriented terminal front end for a session

use crate::commands::Workflow;
use crate::models::{Document, Role, Snapshot};
use crate::session::Session;
use crate::state::WorkflowEvent;
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "Commands: :open <path>, :upload, :ingest, :status, :help, :quit. Anything else is a question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Upload,
    Ingest,
    Status,
    Help,
    Quit,
    Ask(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Self::Ask(line.to_string()));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("open", "") => Err("usage: :open <path>".to_string()),
            ("open", path) => Ok(Self::Open(path.to_string())),
            ("upload", "") => Ok(Self::Upload),
            ("ingest", "") => Ok(Self::Ingest),
            ("status", "") => Ok(Self::Status),
            ("help", "") => Ok(Self::Help),
            ("quit" | "exit", "") => Ok(Self::Quit),
            _ => Err(format!("unknown command ':{}'. {}", rest, HELP)),
        }
    }
}

pub fn render_status(snapshot: &Snapshot) -> String {
    let document = match &snapshot.upload.document {
        Some(doc) => format!("{} ({:.2} MB)", doc.name, doc.size_mib()),
        None => "none".to_string(),
    };
    let chunks = snapshot
        .ingest
        .chunk_count
        .map(|n| format!(", {n} chunks"))
        .unwrap_or_default();
    let mut out = format!(
        "backend: {:?} | document: {} | upload: {:?} | knowledge base: {:?}{}",
        snapshot.connection, document, snapshot.upload.status, snapshot.ingest.status, chunks
    );
    if let Some(message) = &snapshot.status_message {
        out.push('\n');
        out.push_str(message);
    }
    out
}

fn render_event(event: &WorkflowEvent) -> Option<String> {
    match event {
        WorkflowEvent::MessageAppended(m) if m.role == Role::Assistant => Some(format!("assistant> {}", m.text)),
        WorkflowEvent::MessageAppended(_) => None,
        WorkflowEvent::ConnectionChanged(status) => Some(format!("* backend {:?}", status).to_lowercase()),
        WorkflowEvent::UploadChanged(status) => Some(format!("* upload {:?}", status).to_lowercase()),
        WorkflowEvent::IngestChanged(status) => Some(format!("* knowledge base {:?}", status).to_lowercase()),
        WorkflowEvent::AwaitingChanged(true) => Some("* thinking...".to_string()),
        WorkflowEvent::AwaitingChanged(false) => None,
    }
}

// Commands run in the background so the prompt stays responsive, like a UI would
fn dispatch(workflow: &Workflow, command: Command) {
    let workflow = workflow.clone();
    tokio::spawn(async move {
        let refused = match command {
            Command::Upload => workflow.upload().await.err(),
            Command::Ingest => workflow.ingest().await.err(),
            Command::Ask(text) => workflow.submit_query(&text).await.err(),
            _ => None,
        };
        if let Some(e) = refused {
            println!("! {e}");
        }
    });
}

pub async fn run_terminal(session: Session) -> anyhow::Result<()> {
    let workflow = session.workflow().clone();
    let mut events = workflow.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => log::warn!("Terminal skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{}", workflow.snapshot().await.messages[0].text);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Empty) => {}
            Ok(Command::Help) => println!("{HELP}"),
            Ok(Command::Status) => println!("{}", render_status(&workflow.snapshot().await)),
            Ok(Command::Open(path)) => match Document::from_path(&path).await {
                Ok(document) => {
                    let info = document.info();
                    workflow.select_document(document).await;
                    println!("* selected {} ({:.2} MB)", info.name, info.size_mib());
                }
                Err(e) => println!("! {e:#}"),
            },
            Ok(command) => dispatch(&workflow, command),
            Err(usage) => println!("! {usage}"),
        }
    }

    session.shutdown().await;
    printer.abort();
    Ok(())
}
