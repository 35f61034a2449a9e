use crate::commands::Workflow;
use crate::models::ConnectionStatus;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Background probe that keeps the connection status current.
///
/// Probes once immediately, then once per interval, writing only the
/// connection status. Dropping the monitor cancels it; `stop` also waits
/// for the task to finish.
pub struct LivenessMonitor {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    pub fn spawn(workflow: Workflow, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(probe_loop(workflow, interval, token.clone()));
        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Liveness monitor task ended abnormally: {:?}", e);
            }
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn probe_loop(workflow: Workflow, interval: Duration, token: CancellationToken) {
    let session_id = workflow.session_id();
    let backend = workflow.backend();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("[{}] Liveness monitor started ({:?} interval)", session_id, interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let alive = tokio::select! {
            _ = token.cancelled() => break,
            alive = backend.check_health() => alive,
        };
        log::debug!("[{}] Health probe: alive={}", session_id, alive);
        workflow.set_connection(ConnectionStatus::from_liveness(alive)).await;
    }

    log::info!("[{}] Liveness monitor stopped", session_id);
}
