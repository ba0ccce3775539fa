//! Task orchestration and extraction for Open Dental over a remote desktop
//!
//! A workflow is an ordered list of natural-language steps. Each step is
//! handed to a computer-use agent driving the remote desktop, the screen it
//! leaves behind is captured, and the captures are turned into structured
//! records by a vision inference service.

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod extraction;
pub mod http_session;
pub mod image;
pub mod json_recovery;
pub mod log_sink;
pub mod orchestrator;
pub mod prompts;
pub mod screenshot;
pub mod session;
pub mod stream;
pub mod workflow;

pub use cancellation::{RunHandle, RunState};
pub use config::{InferenceSettings, SessionSettings, Settings};
pub use errors::{ExtractionError, RunError, SessionError};
pub use events::AgentEvent;
pub use extraction::ExtractionClient;
pub use http_session::HttpSessionConnector;
pub use image::{ImageRef, MediaType};
pub use log_sink::{LogEntry, LogLevel, LogListener, LogSink};
pub use orchestrator::{RunResult, RunStatus, StepOrchestrator};
pub use session::{AgentOptions, AutomationAgent, ConnectParams, RemoteSession, SessionConnector};
pub use workflow::{StepDefinition, Workflow, WorkflowKind};
