//! Authentication API endpoints
//!
//! Handles HTTP requests for account access:
//! - POST /api/v1/auth/register - Student registration
//! - POST /api/v1/auth/login - Login
//! - POST /api/v1/auth/logout - Logout
//! - GET  /api/v1/auth/me - Current account
//! - PUT  /api/v1/auth/password - Change own password
//! - POST /api/v1/auth/forgot-password - Request a reset email
//! - POST /api/v1/auth/reset-password - Complete the reset

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedStudent};
use crate::services::RegisterInput;

/// Request body for student registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub course: Option<String>,
    pub phone: Option<String>,
    pub mentor_name: Option<String>,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub student: StudentResponse,
    pub token: String,
}

/// Response for account info
#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub course: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub mentor_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: String,
}

impl From<crate::models::Student> for StudentResponse {
    fn from(student: crate::models::Student) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name,
            username: student.username,
            email: student.email,
            role: student.role.to_string(),
            is_active: student.is_active,
            course: student.course,
            phone: student.phone,
            address: student.address,
            mentor_name: student.mentor_name,
            photo_url: student.photo_url,
            created_at: student.created_at.to_rfc3339(),
        }
    }
}

/// Public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Protected auth routes (require auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_student))
        .route("/password", put(change_password))
}

/// POST /api/v1/auth/register - Student registration
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = RegisterInput {
        full_name: body.full_name,
        username: body.username,
        email: body.email,
        password: body.password.clone(),
        course: body.course,
        phone: body.phone,
        mentor_name: body.mentor_name,
    };

    let student = state.user_service.register(input).await?;
    let (session, student) = state
        .user_service
        .login(&student.username, &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        session_cookie(&session.id),
        Json(AuthResponse {
            student: student.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login - Login with username or email
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, student) = state
        .user_service
        .login(&body.username_or_email, &body.password)
        .await?;

    Ok((
        session_cookie(&session.id),
        Json(AuthResponse {
            student: student.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout - End the current session
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    // Expire the cookie regardless
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((response_headers, Json(serde_json::json!({ "ok": true }))))
}

/// GET /api/v1/auth/me - Current account info
async fn get_current_student(
    Extension(student): Extension<AuthenticatedStudent>,
) -> Json<StudentResponse> {
    Json(student.0.into())
}

/// PUT /api/v1/auth/password - Change own password
async fn change_password(
    State(state): State<AppState>,
    Extension(student): Extension<AuthenticatedStudent>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .user_service
        .change_password(student.0.id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /api/v1/auth/forgot-password - Mail a reset link
///
/// Succeeds for unknown addresses; a mail delivery failure for a known
/// address is surfaced as NOTIFICATION_FAILURE.
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.forgot_password(&body.email).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /api/v1/auth/reset-password - Complete the reset flow
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .user_service
        .reset_password(&body.token, &body.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

fn session_cookie(session_id: &str) -> HeaderMap {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_id,
        24 * 60 * 60
    );

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = auth.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }
    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}
