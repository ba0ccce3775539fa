use opendental_cua::{LogEntry, RunResult, RunStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub api: String,
}

/// Body returned by the workflow endpoints. Logs and screenshots stay on
/// the server; only the outcome is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: RunStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl From<&RunResult> for ApiResponse {
    fn from(result: &RunResult) -> Self {
        Self {
            status: result.status,
            data: result.data.clone(),
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub patient_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunApiPayload {
    pub endpoint: String,
    #[serde(default)]
    pub patient_name: Option<String>,
}

/// Messages sent by the WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    RunApi { payload: RunApiPayload },
    StopAgent,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponsePayload {
    pub endpoint: String,
    #[serde(flatten)]
    pub response: ApiResponse,
}

/// Messages streamed to the WebSocket client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ApiLog { payload: LogEntry },
    ApiResponse { payload: ApiResponsePayload },
    Error { message: String },
}
