#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use opendental_cua::session::AgentEventStream;
use opendental_cua::{
    AgentEvent, AgentOptions, AutomationAgent, ConnectParams, RemoteSession, RunHandle, RunState,
    SessionConnector, SessionError, Settings,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted agent does for one step.
pub enum StepScript {
    /// Emits the events, then the stream ends
    Events(Vec<AgentEvent>),
    /// Emits the events, then fails with a transport fault
    FailAfter(Vec<AgentEvent>, &'static str),
    /// Emits the events, then never yields again
    HangAfter(Vec<AgentEvent>),
    /// Writes an image file into the storage root instead of streaming one
    WriteArtifact(&'static str, &'static [u8]),
}

/// Calls observed by the mock session, shared with the test body.
#[derive(Default)]
pub struct SessionCalls {
    pub connects: AtomicUsize,
    pub starts: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub params: Mutex<Vec<ConnectParams>>,
    pub options: Mutex<Vec<AgentOptions>>,
    pub storage_roots: Mutex<Vec<PathBuf>>,
    pub instructions: Mutex<Vec<String>>,
}

impl SessionCalls {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }
}

pub struct MockConnector {
    scripts: Mutex<Option<Vec<StepScript>>>,
    connect_error: Option<String>,
    start_error: Option<String>,
    disconnect_error: Option<String>,
    pub calls: Arc<SessionCalls>,
}

impl MockConnector {
    pub fn new(scripts: Vec<StepScript>) -> Self {
        Self {
            scripts: Mutex::new(Some(scripts)),
            connect_error: None,
            start_error: None,
            disconnect_error: None,
            calls: Arc::new(SessionCalls::default()),
        }
    }

    pub fn failing_connect(message: &str) -> Self {
        Self {
            connect_error: Some(message.to_string()),
            ..Self::new(vec![])
        }
    }

    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn failing_disconnect(mut self, message: &str) -> Self {
        self.disconnect_error = Some(message.to_string());
        self
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteSession>, SessionError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        self.calls.params.lock().unwrap().push(params.clone());
        if let Some(message) = &self.connect_error {
            return Err(SessionError::Connect(message.clone()));
        }

        let scripts = self.scripts.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(MockSession {
            scripts: Mutex::new(Some(scripts)),
            start_error: self.start_error.clone(),
            disconnect_error: self.disconnect_error.clone(),
            calls: self.calls.clone(),
        }))
    }
}

struct MockSession {
    scripts: Mutex<Option<Vec<StepScript>>>,
    start_error: Option<String>,
    disconnect_error: Option<String>,
    calls: Arc<SessionCalls>,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn start(&mut self) -> Result<(), SessionError> {
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        match &self.start_error {
            Some(message) => Err(SessionError::Start(message.clone())),
            None => Ok(()),
        }
    }

    fn agent(
        &self,
        options: &AgentOptions,
        storage_root: &Path,
    ) -> Result<Box<dyn AutomationAgent>, SessionError> {
        self.calls.options.lock().unwrap().push(options.clone());
        self.calls
            .storage_roots
            .lock()
            .unwrap()
            .push(storage_root.to_path_buf());

        let scripts = self.scripts.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(MockAgent {
            scripts: scripts.into(),
            storage_root: storage_root.to_path_buf(),
            calls: self.calls.clone(),
        }))
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        match &self.disconnect_error {
            Some(message) => Err(SessionError::Disconnect(message.clone())),
            None => Ok(()),
        }
    }
}

struct MockAgent {
    scripts: VecDeque<StepScript>,
    storage_root: PathBuf,
    calls: Arc<SessionCalls>,
}

fn events_stream(events: Vec<AgentEvent>) -> impl futures::Stream<Item = Result<AgentEvent, SessionError>> {
    stream::iter(events.into_iter().map(Ok::<_, SessionError>))
}

impl AutomationAgent for MockAgent {
    fn run<'a>(&'a mut self, instruction: &'a str) -> AgentEventStream<'a> {
        self.calls
            .instructions
            .lock()
            .unwrap()
            .push(instruction.to_string());

        match self.scripts.pop_front().unwrap_or(StepScript::Events(vec![])) {
            StepScript::Events(events) => events_stream(events).boxed(),
            StepScript::FailAfter(events, message) => events_stream(events)
                .chain(stream::once(async move {
                    Err(SessionError::Transport(message.to_string()))
                }))
                .boxed(),
            StepScript::HangAfter(events) => events_stream(events).chain(stream::pending()).boxed(),
            StepScript::WriteArtifact(name, bytes) => {
                let dir = self.storage_root.join("turn_001");
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join(name), bytes).unwrap();
                events_stream(vec![AgentEvent::action("screenshot")]).boxed()
            }
        }
    }
}

/// One request received by the mock inference endpoint.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub payload: Value,
}

#[derive(Clone)]
struct InferenceState {
    status: StatusCode,
    body: Value,
    delay: Duration,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockInference {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockInference {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn messages(
    State(state): State<InferenceState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        api_key: header("x-api-key"),
        api_version: header("anthropic-version"),
        payload,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.body.clone()))
}

pub async fn spawn_inference(status: u16, body: Value) -> MockInference {
    spawn_inference_with_delay(status, body, Duration::ZERO).await
}

pub async fn spawn_inference_with_delay(status: u16, body: Value, delay: Duration) -> MockInference {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = InferenceState {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        delay,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/v1/messages", post(messages))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockInference {
        base_url: format!("http://{addr}"),
        requests,
    }
}

/// Messages API body whose first content block carries `text`.
pub fn reply_with(text: &str) -> Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
    })
}

/// Routes library tracing to the test output, filtered by `RUST_LOG`.
pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_settings(inference_url: &str, trajectory_root: &Path) -> Settings {
    setup_logging();
    let mut settings = Settings::default();
    settings.session.sandbox_name = "test-sandbox".to_string();
    settings.session.api_key = "cua-test-key".to_string();
    settings.inference.api_key = "inference-test-key".to_string();
    settings.inference.base_url = inference_url.to_string();
    settings.trajectory_root = trajectory_root.to_path_buf();
    settings
}

pub async fn wait_for_state(handle: &RunHandle, expected: RunState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.state() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("run never reached {expected:?}, last saw {:?}", handle.state()));
}

pub fn messages_of(logs: &[opendental_cua::LogEntry]) -> Vec<String> {
    logs.iter().map(|e| e.message.clone()).collect()
}
