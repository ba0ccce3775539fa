use crate::cancellation::{RunHandle, RunState};
use crate::config::Settings;
use crate::errors::RunError;
use crate::extraction::ExtractionClient;
use crate::image::ImageRef;
use crate::log_sink::{LogEntry, LogListener, LogSink};
use crate::screenshot;
use crate::session::{RemoteSession, SessionConnector};
use crate::stream;
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Terminal artifact of one run. Built once when the run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub logs: Vec<LogEntry>,
    /// Captured screens in step order
    pub screenshots: Vec<ImageRef>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn final_screenshot(&self) -> Option<&ImageRef> {
        self.screenshots.last()
    }
}

/// Runs one workflow against one remote session.
///
/// Steps execute strictly in order since each depends on the screen the
/// previous one left behind. The session is released exactly once on every
/// exit path.
pub struct StepOrchestrator {
    connector: Arc<dyn SessionConnector>,
    extraction: ExtractionClient,
    settings: Settings,
    workflow: Workflow,
    run_id: String,
    token: CancellationToken,
    state: watch::Sender<RunState>,
    listener: Option<Arc<dyn LogListener>>,
}

impl StepOrchestrator {
    pub fn new(connector: Arc<dyn SessionConnector>, settings: Settings, workflow: Workflow) -> Self {
        let extraction = ExtractionClient::new(settings.inference.clone());
        let run_id = format!(
            "{}_api_{}",
            workflow.name,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let (state, _) = watch::channel(RunState::Idle);

        Self {
            connector,
            extraction,
            settings,
            workflow,
            run_id,
            token: CancellationToken::new(),
            state,
            listener: None,
        }
    }

    /// Streams every log entry to `listener` while the run is in progress.
    pub fn with_listener(mut self, listener: Arc<dyn LogListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_extraction_client(mut self, client: ExtractionClient) -> Self {
        self.extraction = client;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle::new(
            self.run_id.clone(),
            self.token.clone(),
            self.state.subscribe(),
        )
    }

    fn publish(&self, state: RunState) {
        self.state.send_replace(state);
    }

    fn storage_root(&self) -> PathBuf {
        self.settings.trajectory_root.join(&self.run_id)
    }

    #[instrument(skip_all, fields(workflow = %self.workflow.name, run_id = %self.run_id))]
    pub async fn run(self) -> RunResult {
        let mut sink = match &self.listener {
            Some(listener) => LogSink::with_listener(
                &self.workflow.name,
                listener.clone(),
                self.settings.log_queue_capacity,
            ),
            None => LogSink::new(&self.workflow.name),
        };
        let mut session: Option<Box<dyn RemoteSession>> = None;
        let mut screenshots = Vec::new();

        let outcome = self
            .execute(&mut sink, &mut session, &mut screenshots)
            .await;

        if let Err(err) = &outcome {
            sink.error(format!("Error: {err}"));
        }

        if let Some(mut session) = session.take() {
            match session.disconnect().await {
                Ok(()) => sink.info("Disconnected from sandbox"),
                Err(e) => error!("Error disconnecting: {}", e),
            }
        }

        let (status, data, error) = match outcome {
            Ok(data) => {
                self.publish(RunState::Completed);
                (RunStatus::Success, Some(data), None)
            }
            Err(err) => {
                self.publish(RunState::Failed);
                (RunStatus::Error, err.data(), Some(err.to_string()))
            }
        };
        info!("Run {} finished with status {:?}", self.run_id, status);

        RunResult {
            status,
            data,
            error,
            logs: sink.finish().await,
            screenshots,
        }
    }

    async fn execute(
        &self,
        sink: &mut LogSink,
        session_slot: &mut Option<Box<dyn RemoteSession>>,
        screenshots: &mut Vec<ImageRef>,
    ) -> Result<Value, RunError> {
        let params = self.settings.session.connect_params();
        self.publish(RunState::Connecting);
        sink.info(format!("Connecting to {} sandbox...", params.kind));

        let connected = self
            .connector
            .connect(&params)
            .await
            .map_err(RunError::Connection)?;
        let session = session_slot.insert(connected);

        sink.info("Starting sandbox connection...");
        session.start().await.map_err(RunError::Connection)?;
        sink.info("Sandbox connected successfully");

        let storage_root = self.storage_root();
        tokio::fs::create_dir_all(&storage_root).await?;
        sink.info(format!(
            "Trajectory will be saved to: {}",
            storage_root.display()
        ));

        sink.info("Creating CUA agent...");
        let options = self
            .settings
            .session
            .agent_options(&self.workflow.system_instructions);
        let mut agent = session
            .agent(&options, &storage_root)
            .map_err(RunError::Connection)?;
        self.publish(RunState::Ready);

        let total = self.workflow.steps.len();
        for (index, step) in self.workflow.steps.iter().enumerate() {
            if self.token.is_cancelled() {
                sink.info(format!(
                    "Run stopped, skipping the remaining {} step(s)",
                    total - index
                ));
                break;
            }

            self.publish(RunState::Running { step: index, total });
            sink.info(format!("Starting {}...", step.label));

            let outcome = stream::consume(agent.as_mut(), &step.instructions, sink, &self.token)
                .await
                .map_err(|source| RunError::StepTransport {
                    label: step.label.clone(),
                    source,
                })?;
            sink.info(format!("{} completed", step.label));

            if !step.capture_screenshot {
                continue;
            }
            if let Some(image) = screenshot::resolve(outcome.screenshot, &storage_root) {
                screenshots.push(image);
                sink.info(format!("{} screenshot captured", step.label));
            }
        }

        if screenshots.is_empty() {
            return Err(RunError::NoScreenshotCaptured);
        }

        self.publish(RunState::Extracting);
        sink.info(format!(
            "Sending {} screenshot(s) for analysis...",
            screenshots.len()
        ));
        let data = self
            .extraction
            .extract(screenshots, &self.workflow.schema_prompt)
            .await?;
        sink.info(self.workflow.summarize(&data));

        Ok(data)
    }
}
