//! API layer - HTTP handlers and routing
//!
//! All endpoints for the attendance tracker:
//! - Auth endpoints (register, login, password reset)
//! - Attendance endpoints (check-in/out, proof upload, history)
//! - Analytics endpoints (productivity snapshots)
//! - Admin endpoints (daily roster, ratings, remarks, sweeps)
//! - Student self-service endpoints (profile, photo)

pub mod admin;
pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod middleware;
pub mod students;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedStudent};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/attendance", attendance::router())
        .nest("/analytics", analytics::router())
        .nest("/students", students::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str, upload_dir: &std::path::Path) -> Router {
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(cors_origin, "invalid CORS origin, allowing none");
            CorsLayer::new()
        }
    };

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        // Uploaded proofs and photos served as static files
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
