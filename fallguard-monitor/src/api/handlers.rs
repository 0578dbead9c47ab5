//! Frame and decision handlers

use crate::confirm::Decision;
use crate::detection::{Detection, FrameInput, TrackId};
use crate::error::{ApiError, ApiResult};
use crate::monitor::{FrameReport, MonitorSnapshot};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// POST /api/detect request
///
/// `detections` missing or `null` marks the frame unavailable.
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
}

/// POST /api/confirm_fall and /api/deny_fall request
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub track_id: TrackId,
}

/// Decision response
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<Uuid>,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(inner)| inner)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// POST /api/detect
pub async fn detect(
    State(state): State<AppState>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<FrameReport>> {
    let request = json_body(body)?;
    let report = state
        .monitor
        .process_frame(FrameInput::from_optional(request.detections))
        .await;
    Ok(Json(report))
}

/// POST /api/confirm_fall
pub async fn confirm_fall(
    State(state): State<AppState>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> ApiResult<Json<DecisionResponse>> {
    let request = json_body(body)?;
    let outcome = state
        .monitor
        .decide(request.track_id, Decision::Confirm)
        .await?;

    Ok(Json(DecisionResponse {
        message: "Emergency action taken".to_string(),
        incident_id: outcome.incident.map(|i| i.incident_id),
    }))
}

/// POST /api/deny_fall
pub async fn deny_fall(
    State(state): State<AppState>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> ApiResult<Json<DecisionResponse>> {
    let request = json_body(body)?;
    state
        .monitor
        .decide(request.track_id, Decision::Deny)
        .await?;

    Ok(Json(DecisionResponse {
        message: "Alert cancelled".to_string(),
        incident_id: None,
    }))
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<MonitorSnapshot> {
    Json(state.monitor.snapshot().await)
}
