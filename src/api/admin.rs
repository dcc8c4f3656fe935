//! Admin API endpoints
//!
//! Mentor-facing operations, all behind the admin guard:
//! - GET    /api/v1/admin/report/daily - Daily roster (JSON)
//! - GET    /api/v1/admin/report/daily.csv - Same roster as CSV download
//! - POST   /api/v1/admin/attendance/{id}/rate - Rate a day's work
//! - POST   /api/v1/admin/students/{id}/remark - Attach a remark to a date
//! - GET    /api/v1/admin/students/{id}/attendance - One student's history
//! - GET    /api/v1/admin/students - Full roster
//! - PUT    /api/v1/admin/students/{id}/active - Enable/disable an account
//! - DELETE /api/v1/admin/students/{id} - Remove an account
//! - POST   /api/v1/admin/sweeps/warn - Trigger the reminder sweep now
//! - POST   /api/v1/admin/sweeps/lockdown - Trigger the lockdown sweep now

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::auth::StudentResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedStudent};
use crate::services::RosterEntry;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Local date, "YYYY-MM-DD"; defaults to today
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemarkRequest {
    /// Local date, "YYYY-MM-DD"
    pub date: String,
    pub remark: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub affected: u64,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/report/daily", get(daily_report))
        .route("/report/daily.csv", get(daily_report_csv))
        .route("/attendance/{id}/rate", post(rate_attendance))
        .route("/students/{id}/remark", post(add_remark))
        .route("/students/{id}/attendance", get(student_history))
        .route("/students", get(list_students))
        .route("/students/{id}/active", put(set_active))
        .route("/students/{id}", delete(delete_student))
        .route("/sweeps/warn", post(run_warn_sweep))
        .route("/sweeps/lockdown", post(run_lockdown_sweep))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation_error(format!("Invalid date: {}", raw)))
}

fn report_date(state: &AppState, query: &ReportQuery) -> Result<NaiveDate, ApiError> {
    match &query.date {
        Some(raw) => parse_date(raw),
        None => Ok(state.report_service.today()),
    }
}

/// GET /api/v1/admin/report/daily - Roster for one date
async fn daily_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<RosterEntry>>, ApiError> {
    let date = report_date(&state, &query)?;
    let roster = state.report_service.daily_roster(date).await?;
    Ok(Json(roster))
}

/// GET /api/v1/admin/report/daily.csv - Roster as a CSV download
async fn daily_report_csv(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = report_date(&state, &query)?;
    let csv = state.report_service.daily_roster_csv(date).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    let disposition = format!("attachment; filename=\"attendance-{}.csv\"", date);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((headers, csv))
}

/// POST /api/v1/admin/attendance/{id}/rate - Rate a day's work (1-5)
async fn rate_attendance(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedStudent>,
    Path(id): Path<i64>,
    Json(body): Json<RateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .attendance_service
        .rate(
            id,
            body.rating,
            body.feedback.as_deref().unwrap_or(""),
            &admin.0.username,
        )
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /api/v1/admin/students/{id}/remark - Attach a remark to a date
async fn add_remark(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RemarkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&body.date)?;
    state
        .attendance_service
        .add_remark(id, date, &body.remark)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /api/v1/admin/students/{id}/attendance - One student's history
async fn student_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<crate::api::attendance::AttendanceResponse>>, ApiError> {
    let records = state.attendance_service.history(id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/admin/students - Full student roster
async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    let students = state.user_service.list_students().await?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

/// PUT /api/v1/admin/students/{id}/active - Enable or disable an account
async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.set_active(id, body.active).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// DELETE /api/v1/admin/students/{id} - Remove an account
async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.delete_student(id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /api/v1/admin/sweeps/warn - Run the reminder sweep now
async fn run_warn_sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>, ApiError> {
    let delivered = state
        .scheduler
        .run_warn_sweep()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok(Json(SweepResponse {
        affected: delivered as u64,
    }))
}

/// POST /api/v1/admin/sweeps/lockdown - Run the lockdown sweep now
async fn run_lockdown_sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepResponse>, ApiError> {
    let closed = state
        .scheduler
        .run_lockdown_sweep()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok(Json(SweepResponse { affected: closed }))
}
