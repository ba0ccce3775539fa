use opendental_cua::{
    LogListener, RunHandle, RunResult, SessionConnector, Settings, StepOrchestrator, WorkflowKind,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Owns the single remote sandbox: at most one run is active at a time.
pub struct RunManager {
    settings: Settings,
    connector: Arc<dyn SessionConnector>,
    active: Arc<Mutex<Option<RunHandle>>>,
}

impl RunManager {
    pub fn new(settings: Settings, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            settings,
            connector,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs a built-in workflow to completion.
    ///
    /// The run itself is spawned, so a client that goes away mid-run does not
    /// leave the sandbox connected.
    pub async fn run(
        &self,
        kind: WorkflowKind,
        patient_name: Option<&str>,
        listener: Option<Arc<dyn LogListener>>,
    ) -> Result<RunResult, String> {
        let workflow = kind
            .workflow(patient_name)
            .ok_or_else(|| format!("patient_name is required for {kind}"))?;

        let mut orchestrator =
            StepOrchestrator::new(self.connector.clone(), self.settings.clone(), workflow);
        if let Some(listener) = listener {
            orchestrator = orchestrator.with_listener(listener);
        }
        let handle = orchestrator.handle();

        {
            let mut active = self.active.lock().await;
            if let Some(current) = active.as_ref() {
                if !current.state().is_terminal() {
                    warn!("Rejected {} while {} is running", kind, current.run_id());
                    return Err(format!(
                        "A run is already in progress ({})",
                        current.run_id()
                    ));
                }
            }
            *active = Some(handle.clone());
        }

        info!("Starting {} run {}", kind, handle.run_id());
        let active = self.active.clone();
        let run_id = handle.run_id().to_string();
        let task = tokio::spawn(async move {
            let result = orchestrator.run().await;
            let mut slot = active.lock().await;
            if slot.as_ref().is_some_and(|h| h.run_id() == run_id) {
                *slot = None;
            }
            result
        });

        task.await.map_err(|e| format!("Run task failed: {e}"))
    }

    /// Requests the active run to stop. Returns its id, if there was one.
    pub async fn stop(&self) -> Option<String> {
        let active = self.active.lock().await;
        active.as_ref().map(|handle| {
            handle.stop();
            handle.run_id().to_string()
        })
    }

    pub async fn active_run(&self) -> Option<RunHandle> {
        self.active.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opendental_cua::{RemoteSession, RunStatus, SessionError};
    use opendental_cua::ConnectParams;

    struct OfflineConnector;

    #[async_trait]
    impl SessionConnector for OfflineConnector {
        async fn connect(
            &self,
            _params: &ConnectParams,
        ) -> Result<Box<dyn RemoteSession>, SessionError> {
            Err(SessionError::Connect("sandbox offline".to_string()))
        }
    }

    fn manager() -> RunManager {
        RunManager::new(Settings::default(), Arc::new(OfflineConnector))
    }

    #[tokio::test]
    async fn test_patient_workflows_need_a_name() {
        let err = manager()
            .run(WorkflowKind::Reports, None, None)
            .await
            .unwrap_err();
        assert_eq!(err, "patient_name is required for reports");
    }

    #[tokio::test]
    async fn test_finished_run_frees_the_slot() {
        let manager = manager();
        let result = manager
            .run(WorkflowKind::Appointments, None, None)
            .await
            .unwrap();
        assert_eq!(result.status, RunStatus::Error);
        assert!(manager.active_run().await.is_none());
        assert!(manager.stop().await.is_none());
    }
}
