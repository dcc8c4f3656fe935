//! Analytics API endpoints
//!
//! - GET /api/v1/analytics/me - Own productivity snapshot
//! - GET /api/v1/analytics/students/{id} - Any student's snapshot (admin)

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedStudent};
use crate::models::StudentRole;
use crate::services::ProductivitySnapshot;

/// Routes that only need a valid session
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_snapshot))
        .route("/students/{id}", get(student_snapshot))
}

/// GET /api/v1/analytics/me - Own snapshot
async fn my_snapshot(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
) -> Result<Json<ProductivitySnapshot>, ApiError> {
    let snapshot = state.analytics_service.snapshot(student.0.id).await?;
    Ok(Json(snapshot))
}

/// GET /api/v1/analytics/students/{id} - Another student's snapshot
///
/// Students may only read their own; admins may read anyone's.
async fn student_snapshot(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    Path(id): Path<i64>,
) -> Result<Json<ProductivitySnapshot>, ApiError> {
    if student.0.role != StudentRole::Admin && student.0.id != id {
        return Err(ApiError::forbidden("You can only view your own analytics"));
    }

    let snapshot = state.analytics_service.snapshot(id).await?;
    Ok(Json(snapshot))
}
