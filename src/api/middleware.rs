//! API middleware
//!
//! Session-token authentication, admin authorization and the shared
//! error envelope every endpoint responds with.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::UploadConfig;
use crate::models::{Student, StudentRole};
use crate::services::{
    AnalyticsError, AnalyticsService, AttendanceError, AttendanceService, AutocloseScheduler,
    ReportError, ReportService, UserError, UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub attendance_service: Arc<AttendanceService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub report_service: Arc<ReportService>,
    pub scheduler: Arc<AutocloseScheduler>,
    pub upload_config: Arc<UploadConfig>,
}

/// Authenticated student extracted from the request
#[derive(Debug, Clone)]
pub struct AuthenticatedStudent(pub Student);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "ACCOUNT_DISABLED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "NO_ACTIVE_SESSION" | "ALREADY_COMPLETED" | "INVALID_DURATION" => {
                StatusCode::BAD_REQUEST
            }
            "CONFLICT" | "DUPLICATE_SESSION" => StatusCode::CONFLICT,
            "UNSUPPORTED_MEDIA_TYPE" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "NOTIFICATION_FAILURE" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<AttendanceError> for ApiError {
    fn from(err: AttendanceError) -> Self {
        let message = err.to_string();
        match err {
            AttendanceError::DuplicateSession => Self::new("DUPLICATE_SESSION", message),
            AttendanceError::NoActiveSession => Self::new("NO_ACTIVE_SESSION", message),
            AttendanceError::AlreadyCompleted => Self::new("ALREADY_COMPLETED", message),
            AttendanceError::InvalidDuration => Self::new("INVALID_DURATION", message),
            AttendanceError::UnsupportedMediaType(_) => {
                Self::new("UNSUPPORTED_MEDIA_TYPE", message)
            }
            AttendanceError::InvalidRating => Self::validation_error(message),
            AttendanceError::RecordNotFound => Self::not_found(message),
            AttendanceError::Internal(err) => {
                tracing::error!(error = %err, "attendance operation failed");
                Self::internal_error("Something went wrong")
            }
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err {
            UserError::InvalidCredentials | UserError::InvalidSession => {
                Self::unauthorized(message)
            }
            UserError::AccountDisabled => Self::new("ACCOUNT_DISABLED", message),
            UserError::UsernameTaken | UserError::EmailTaken => Self::new("CONFLICT", message),
            UserError::WeakPassword | UserError::InvalidResetToken => {
                Self::validation_error(message)
            }
            UserError::StudentNotFound => Self::not_found(message),
            UserError::UnsupportedMediaType(_) => Self::new("UNSUPPORTED_MEDIA_TYPE", message),
            UserError::NotificationFailure(_) => Self::new("NOTIFICATION_FAILURE", message),
            UserError::Internal(err) => {
                tracing::error!(error = %err, "account operation failed");
                Self::internal_error("Something went wrong")
            }
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        tracing::error!(error = %err, "analytics failed");
        Self::internal_error("Something went wrong")
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        tracing::error!(error = %err, "report failed");
        Self::internal_error("Something went wrong")
    }
}

/// Extract session token from request
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let student = state.user_service.validate_session(&token).await?;

    request.extensions_mut().insert(AuthenticatedStudent(student));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let student = request
        .extensions()
        .get::<AuthenticatedStudent>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if student.0.role != StudentRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}
