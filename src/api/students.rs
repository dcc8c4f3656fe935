//! Student self-service API endpoints
//!
//! - PUT  /api/v1/students/me/profile - Update own profile
//! - POST /api/v1/students/me/photo - Upload a profile photo (multipart)
//! - POST /api/v1/students/me/remark - Leave a remark on one of my dates
//! - GET  /api/v1/students/{id} - Student detail (self or admin)

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::StudentResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedStudent};
use crate::db::repositories::ProfilePatch;
use crate::models::StudentRole;

/// Request body for profile update; absent fields stay unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub course: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub mentor_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoUploadResponse {
    pub photo_url: String,
}

/// Build the students router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me/profile", put(update_profile))
        .route("/me/photo", post(upload_photo))
        .route("/me/remark", post(add_remark))
        .route("/{id}", get(get_student))
}

/// Request body for a self-remark (sick leave and the like)
#[derive(Debug, Deserialize)]
pub struct RemarkRequest {
    /// Local date, "YYYY-MM-DD"
    pub date: String,
    pub remark: String,
}

/// POST /api/v1/students/me/remark - Remark on one of my dates
async fn add_remark(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    Json(body): Json<RemarkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = chrono::NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
        .map_err(|_| ApiError::validation_error(format!("Invalid date: {}", body.date)))?;
    state
        .attendance_service
        .add_remark(student.0.id, date, &body.remark)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// PUT /api/v1/students/me/profile - Update own profile
async fn update_profile(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    let patch = ProfilePatch {
        full_name: body.full_name,
        course: body.course,
        phone: body.phone,
        address: body.address,
        mentor_name: body.mentor_name,
    };

    let updated = state.user_service.update_profile(student.0.id, patch).await?;
    Ok(Json(updated.into()))
}

/// POST /api/v1/students/me/photo - Upload a profile photo
///
/// Accepts multipart/form-data with a single field named "file".
/// JPEG and PNG only.
async fn upload_photo(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    mut multipart: Multipart,
) -> Result<Json<PhotoUploadResponse>, ApiError> {
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

        let photo_url = state
            .user_service
            .upload_photo(&student.0, &data, &content_type)
            .await?;
        return Ok(Json(PhotoUploadResponse { photo_url }));
    }

    Err(ApiError::validation_error("No file field in upload"))
}

/// GET /api/v1/students/{id} - Student detail
///
/// Students may only read themselves; admins may read anyone.
async fn get_student(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedStudent>,
    Path(id): Path<i64>,
) -> Result<Json<StudentResponse>, ApiError> {
    if caller.0.role != StudentRole::Admin && caller.0.id != id {
        return Err(ApiError::forbidden("You can only view your own profile"));
    }

    let student = state.user_service.get_student(id).await?;
    Ok(Json(student.into()))
}
