//! Attendance API endpoints
//!
//! The student-facing session lifecycle:
//! - POST /api/v1/attendance/check-in - Open today's session
//! - POST /api/v1/attendance/check-out - Close it with a task report
//! - POST /api/v1/attendance/proof - Upload a work proof (multipart)
//! - GET  /api/v1/attendance/today - Today's record, if any
//! - GET  /api/v1/attendance/history - Recent history, newest first

use axum::{
    extract::{Multipart, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedStudent};
use crate::models::AttendanceRecord;
use crate::services::CheckOutInput;

/// Request body for check-out
#[derive(Debug, Deserialize)]
pub struct CheckOutRequest {
    pub tasks: String,
    pub proof_url: Option<String>,
    pub doubts: Option<String>,
}

/// Response for one attendance record
#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub id: i64,
    pub day: String,
    pub status: String,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub duration_hours: f64,
    pub tasks: Option<String>,
    pub proof_url: Option<String>,
    pub doubts: Option<String>,
    pub remarks: Option<String>,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            id: record.id,
            day: record.day,
            status: record.status.to_string(),
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            duration_hours: record.duration_hours,
            tasks: record.tasks,
            proof_url: record.proof_url,
            doubts: record.doubts,
            remarks: record.remarks,
            rating: record.rating,
            feedback: record.feedback,
        }
    }
}

/// Response for a proof upload
#[derive(Debug, Serialize)]
pub struct ProofUploadResponse {
    pub url: String,
    pub filename: String,
}

/// Build the attendance router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check-in", post(check_in))
        .route("/check-out", post(check_out))
        .route("/proof", post(upload_proof))
        .route("/today", get(today))
        .route("/history", get(history))
}

/// POST /api/v1/attendance/check-in - Open today's session
async fn check_in(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let record = state.attendance_service.check_in(student.0.id).await?;
    Ok(Json(record.into()))
}

/// POST /api/v1/attendance/check-out - Complete today's session
async fn check_out(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    Json(body): Json<CheckOutRequest>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    if body.tasks.trim().is_empty() {
        return Err(ApiError::validation_error("Task report cannot be empty"));
    }

    let record = state
        .attendance_service
        .check_out(
            student.0.id,
            CheckOutInput {
                tasks: body.tasks,
                proof_url: body.proof_url,
                doubts: body.doubts,
            },
        )
        .await?;
    Ok(Json(record.into()))
}

/// POST /api/v1/attendance/proof - Upload a work proof
///
/// Accepts multipart/form-data with a single field named "file".
/// JPEG, PNG and PDF only.
async fn upload_proof(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    mut multipart: Multipart,
) -> Result<Json<ProofUploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        if data.len() as u64 > state.upload_config.max_file_size {
            return Err(ApiError::validation_error(format!(
                "File too large. Maximum size: {} MB",
                state.upload_config.max_file_size / 1024 / 1024
            )));
        }

        let blob = state
            .attendance_service
            .upload_proof(&student.0.username, &data, &content_type)
            .await?;

        return Ok(Json(ProofUploadResponse {
            url: blob.url,
            filename: blob.filename,
        }));
    }

    Err(ApiError::validation_error("No file field in upload"))
}

/// GET /api/v1/attendance/today - Today's record
async fn today(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
) -> Result<Json<Option<AttendanceResponse>>, ApiError> {
    let record = state.attendance_service.today(student.0.id).await?;
    Ok(Json(record.map(Into::into)))
}

/// GET /api/v1/attendance/history - Recent attendance, newest first
async fn history(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
) -> Result<Json<Vec<AttendanceResponse>>, ApiError> {
    let records = state.attendance_service.history(student.0.id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
