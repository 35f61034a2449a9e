use crate::api::{BackendApi, HttpBackend};
use crate::commands::Workflow;
use crate::config::ClientConfig;
use crate::monitor::LivenessMonitor;
use std::sync::Arc;
use std::time::Duration;

/// One document question-answering session: the workflow plus its liveness
/// monitor. Must be created inside a tokio runtime.
pub struct Session {
    workflow: Workflow,
    monitor: LivenessMonitor,
}

impl Session {
    pub fn start(backend: Arc<dyn BackendApi>, health_interval: Duration) -> Self {
        let workflow = Workflow::new(backend);
        let monitor = LivenessMonitor::spawn(workflow.clone(), health_interval);
        Self { workflow, monitor }
    }

    /// Starts a session against the HTTP backend described by `config`.
    pub fn connect(config: &ClientConfig) -> anyhow::Result<Self> {
        config.validate()?;
        log::info!("Connecting to backend at {}", config.backend_url);
        let backend: Arc<dyn BackendApi> = Arc::new(HttpBackend::from_config(config)?);
        Ok(Self::start(backend, config.health_interval()))
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    /// Stops the liveness monitor. In-flight commands on cloned workflow
    /// handles are left to finish.
    pub async fn shutdown(self) {
        log::info!("[{}] Shutting down session", self.workflow.session_id());
        self.monitor.stop().await;
    }
}
