//! Studytrack - student attendance and productivity tracking

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studytrack::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAttendanceRepository, SqlxPasswordResetRepository, SqlxSessionRepository,
            SqlxStudentRepository,
        },
    },
    services::{
        AnalyticsService, AttendanceService, AutocloseScheduler, LocalBlobStore, ReportService,
        SmtpNotifier, UserService,
    },
    time::{Clock, SystemClock},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studytrack=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Studytrack...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    let timezone = config.schedule.timezone()?;
    tracing::info!(%timezone, "Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let student_repo = SqlxStudentRepository::boxed(pool.clone());
    let attendance_repo = SqlxAttendanceRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let reset_repo = SqlxPasswordResetRepository::boxed(pool.clone());

    // Shared collaborators
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(timezone));
    let notifier = Arc::new(SmtpNotifier::new(config.email.clone()));
    let blob_store = Arc::new(LocalBlobStore::new(
        config.upload.path.clone(),
        config.upload.public_base.clone(),
    ));
    let upload_config = Arc::new(config.upload.clone());

    // Initialize services
    let user_service = Arc::new(UserService::new(
        student_repo.clone(),
        session_repo,
        reset_repo,
        notifier.clone(),
        blob_store.clone(),
        upload_config.clone(),
        config.auth.clone(),
    ));
    let attendance_service = Arc::new(AttendanceService::new(
        attendance_repo.clone(),
        blob_store,
        upload_config.clone(),
        clock.clone(),
    ));
    let analytics_service = Arc::new(AnalyticsService::new(attendance_repo.clone(), clock.clone()));
    let report_service = Arc::new(ReportService::new(
        attendance_repo.clone(),
        student_repo.clone(),
        clock.clone(),
    ));
    let scheduler = Arc::new(AutocloseScheduler::new(
        attendance_repo,
        student_repo,
        notifier,
        clock,
        config.schedule.clone(),
    ));

    // Make sure the configured admin account can log in
    user_service.ensure_admin().await?;

    // Start the daily warn and lockdown timers
    scheduler.clone().spawn()?;
    tracing::info!(
        warn_at = %config.schedule.warn_at,
        lockdown_at = %config.schedule.lockdown_at,
        "Autoclose scheduler started"
    );

    // Build application state
    let state = AppState {
        user_service,
        attendance_service,
        analytics_service,
        report_service,
        scheduler,
        upload_config,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin, &config.upload.path);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
