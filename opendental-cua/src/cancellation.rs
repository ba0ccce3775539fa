use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Lifecycle of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Connecting,
    Ready,
    Running { step: usize, total: usize },
    Extracting,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// Cloneable control surface for a run owned by a `StepOrchestrator`.
///
/// Stopping is cooperative: the run notices at its next suspension point.
/// An action already dispatched to the remote desktop, or an inference call
/// in flight, is not interrupted.
#[derive(Clone, Debug)]
pub struct RunHandle {
    run_id: String,
    token: CancellationToken,
    state: watch::Receiver<RunState>,
    started_at: Instant,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: String,
        token: CancellationToken,
        state: watch::Receiver<RunState>,
    ) -> Self {
        Self {
            run_id,
            token,
            state,
            started_at: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            info!("Stop requested for run {}", self.run_id);
        }
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Waits until the run reaches `Completed` or `Failed`.
    pub async fn finished(&mut self) -> RunState {
        match self.state.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            // Orchestrator dropped before publishing a terminal state
            Err(_) => RunState::Failed,
        }
    }
}

/// Awaits `operation` unless `token` is cancelled first.
pub async fn with_cancellation<F, T>(token: &CancellationToken, operation: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = operation => Some(result),
    }
}
