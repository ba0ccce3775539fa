use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use opendental_cua::WorkflowKind;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::run_manager::RunManager;
use crate::types::{ApiResponse, HealthResponse, PatientQuery};

// ============================================================================
// Error Handling
// ============================================================================

pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.0 })),
        )
            .into_response()
    }
}

impl From<String> for ApiError {
    fn from(err: String) -> Self {
        ApiError(err)
    }
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        api: "opendental-cua".to_string(),
    })
}

// ============================================================================
// Workflows
// ============================================================================

async fn run_workflow(
    manager: &RunManager,
    kind: WorkflowKind,
    patient_name: Option<&str>,
) -> Result<Json<ApiResponse>, ApiError> {
    info!("POST /api/{}", kind);
    let result = manager.run(kind, patient_name, None).await?;
    if !result.is_success() {
        return Err(ApiError(result.error.unwrap_or_else(|| "Run failed".to_string())));
    }
    Ok(Json(ApiResponse::from(&result)))
}

pub async fn patients(
    State(manager): State<Arc<RunManager>>,
) -> Result<Json<ApiResponse>, ApiError> {
    run_workflow(&manager, WorkflowKind::Patients, None).await
}

pub async fn appointments(
    State(manager): State<Arc<RunManager>>,
) -> Result<Json<ApiResponse>, ApiError> {
    run_workflow(&manager, WorkflowKind::Appointments, None).await
}

pub async fn patient_chart(
    State(manager): State<Arc<RunManager>>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<ApiResponse>, ApiError> {
    run_workflow(&manager, WorkflowKind::PatientChart, Some(&query.patient_name)).await
}

pub async fn reports(
    State(manager): State<Arc<RunManager>>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<ApiResponse>, ApiError> {
    run_workflow(&manager, WorkflowKind::Reports, Some(&query.patient_name)).await
}

// ============================================================================
// Stop
// ============================================================================

pub async fn stop(State(manager): State<Arc<RunManager>>) -> Json<serde_json::Value> {
    match manager.stop().await {
        Some(run_id) => Json(json!({ "status": "stopping", "run_id": run_id })),
        None => Json(json!({ "status": "idle" })),
    }
}

pub async fn status(State(manager): State<Arc<RunManager>>) -> Json<serde_json::Value> {
    match manager.active_run().await {
        Some(handle) => Json(json!({
            "run_id": handle.run_id(),
            "state": handle.state(),
            "stopped": handle.is_stopped(),
            "elapsed_secs": handle.elapsed().as_secs_f64(),
        })),
        None => Json(json!({ "state": { "state": "idle" } })),
    }
}
