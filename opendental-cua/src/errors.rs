use std::time::Duration;
use thiserror::Error;

/// Faults raised by the remote desktop session or its automation agent.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to sandbox: {0}")]
    Connect(String),

    #[error("Sandbox did not become ready: {0}")]
    Start(String),

    #[error("Agent stream failed: {0}")]
    Transport(String),

    #[error("Malformed agent event: {0}")]
    MalformedEvent(String),

    #[error("Failed to disconnect from sandbox: {0}")]
    Disconnect(String),

    #[error("Session is not connected")]
    NotConnected,
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

/// Failures talking to the inference endpoint.
///
/// A reply that arrives but cannot be turned into JSON is not an error; it is
/// returned as data carrying an error marker (see [`crate::json_recovery`]).
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("API error: {status}")]
    Status { status: u16, body: String },

    #[error("Inference request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Inference request failed: {0}")]
    Transport(String),

    #[error("Invalid inference response body: {0}")]
    InvalidBody(String),

    #[error("No images to extract from")]
    NoImages,
}

impl ExtractionError {
    /// HTTP status carried by the failure, if the endpoint answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ExtractionError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured error object surfaced to callers in place of extracted data.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "status_code": self.status_code(),
        })
    }
}

/// Terminal failure of one orchestration run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Connection(SessionError),

    #[error("{label} failed: {source}")]
    StepTransport {
        label: String,
        #[source]
        source: SessionError,
    },

    #[error("No screenshots captured during task execution")]
    NoScreenshotCaptured,

    #[error("{0}")]
    UpstreamInference(#[from] ExtractionError),

    #[error("Failed to prepare run storage: {0}")]
    Storage(#[from] std::io::Error),
}

impl RunError {
    /// Data payload attached to the terminal result, if the failure has one.
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            RunError::UpstreamInference(err) => Some(err.to_value()),
            _ => None,
        }
    }
}
