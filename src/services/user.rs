//! Account management service
//!
//! Registration, login sessions, password reset and profile upkeep. Login
//! hands out opaque uuid tokens with a short expiry; password-reset tokens
//! are one-shot and mailed out, and a delivery failure there surfaces to
//! the caller instead of being swallowed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::{AuthConfig, UploadConfig};
use crate::db::repositories::{
    PasswordResetRepository, ProfilePatch, SessionRepository, StudentRepository,
};
use crate::models::{PasswordReset, Session, Student, StudentRole};
use crate::services::email::Notifier;
use crate::services::password::{hash_password, verify_password};
use crate::services::storage::BlobStore;

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Username is already taken.")]
    UsernameTaken,

    #[error("An account with this email already exists.")]
    EmailTaken,

    #[error("Password must be at least 8 characters.")]
    WeakPassword,

    #[error("Session is invalid or has expired.")]
    InvalidSession,

    #[error("Account is deactivated. Contact your mentor.")]
    AccountDisabled,

    #[error("Reset link is invalid or has expired.")]
    InvalidResetToken,

    #[error("Student not found.")]
    StudentNotFound,

    #[error("Unsupported image type: {0}. Only JPEG and PNG are accepted.")]
    UnsupportedMediaType(String),

    #[error("Could not send email: {0}")]
    NotificationFailure(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Registration payload.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub course: Option<String>,
    pub phone: Option<String>,
    pub mentor_name: Option<String>,
}

/// Account management service
pub struct UserService {
    student_repo: Arc<dyn StudentRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    notifier: Arc<dyn Notifier>,
    blob_store: Arc<dyn BlobStore>,
    upload_config: Arc<UploadConfig>,
    auth: AuthConfig,
}

impl UserService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        student_repo: Arc<dyn StudentRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        notifier: Arc<dyn Notifier>,
        blob_store: Arc<dyn BlobStore>,
        upload_config: Arc<UploadConfig>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            student_repo,
            session_repo,
            reset_repo,
            notifier,
            blob_store,
            upload_config,
            auth,
        }
    }

    /// Create the configured admin account if no such username exists.
    /// Called once at startup so login is uniform for admins and students.
    pub async fn ensure_admin(&self) -> Result<(), UserError> {
        if self
            .student_repo
            .find_by_username(&self.auth.admin_user)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let mut admin = Student::new(
            "Administrator".to_string(),
            self.auth.admin_user.clone(),
            format!("{}@studytrack.local", self.auth.admin_user),
            hash_password(&self.auth.admin_pass)?,
        );
        admin.role = StudentRole::Admin;
        self.student_repo.create(&admin).await?;
        tracing::info!(username = %self.auth.admin_user, "admin account created");
        Ok(())
    }

    /// Register a new student account.
    pub async fn register(&self, input: RegisterInput) -> Result<Student, UserError> {
        if input.password.len() < 8 {
            return Err(UserError::WeakPassword);
        }
        if self
            .student_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(UserError::UsernameTaken);
        }
        if self
            .student_repo
            .find_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(UserError::EmailTaken);
        }

        let mut student = Student::new(
            input.full_name,
            input.username,
            input.email,
            hash_password(&input.password)?,
        );
        student.course = input.course;
        student.phone = input.phone;
        student.mentor_name = input.mentor_name;

        let created = self.student_repo.create(&student).await?;
        tracing::info!(student_id = created.id, username = %created.username, "student registered");
        Ok(created)
    }

    /// Authenticate by username or email and mint a session token.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<(Session, Student), UserError> {
        let student = match self.student_repo.find_by_username(username_or_email).await? {
            Some(s) => Some(s),
            None => self.student_repo.find_by_email(username_or_email).await?,
        }
        .ok_or(UserError::InvalidCredentials)?;

        if !verify_password(password, &student.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }
        if !student.is_active {
            return Err(UserError::AccountDisabled);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            student_id: student.id,
            expires_at: now + Duration::days(self.auth.session_days),
            created_at: now,
        };
        self.session_repo.create(&session).await?;

        // Opportunistic cleanup; stale rows are harmless but pointless.
        let _ = self.session_repo.delete_expired().await;

        tracing::info!(student_id = student.id, "login");
        Ok((session, student))
    }

    /// Resolve a session token to its live account, if any.
    pub async fn validate_session(&self, session_id: &str) -> Result<Student, UserError> {
        let session = self
            .session_repo
            .get_by_id(session_id)
            .await?
            .ok_or(UserError::InvalidSession)?;

        if session.is_expired() {
            self.session_repo.delete(session_id).await?;
            return Err(UserError::InvalidSession);
        }

        let student = self
            .student_repo
            .find_by_id(session.student_id)
            .await?
            .ok_or(UserError::InvalidSession)?;

        if !student.is_active {
            return Err(UserError::AccountDisabled);
        }
        Ok(student)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserError> {
        self.session_repo.delete(session_id).await?;
        Ok(())
    }

    /// Start the forgot-password flow. Unknown emails succeed quietly to
    /// avoid account enumeration; an email delivery failure surfaces.
    pub async fn forgot_password(&self, email: &str) -> Result<(), UserError> {
        let Some(student) = self.student_repo.find_by_email(email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        let now = Utc::now();
        let reset = PasswordReset {
            token: Uuid::new_v4().to_string(),
            email: student.email.clone(),
            expires_at: now + Duration::minutes(self.auth.reset_token_minutes),
            created_at: now,
        };
        self.reset_repo.create(&reset).await?;

        self.notifier
            .send_password_reset(&student.email, &reset.token)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "password reset email failed");
                UserError::NotificationFailure(err.to_string())
            })?;

        let _ = self.reset_repo.delete_expired().await;
        Ok(())
    }

    /// Complete the forgot-password flow. The token is single-use; all of
    /// the account's sessions are revoked on success.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), UserError> {
        if new_password.len() < 8 {
            return Err(UserError::WeakPassword);
        }

        let reset = self
            .reset_repo
            .find_by_token(token)
            .await?
            .ok_or(UserError::InvalidResetToken)?;

        if reset.is_expired() {
            self.reset_repo.delete(token).await?;
            return Err(UserError::InvalidResetToken);
        }

        let student = self
            .student_repo
            .find_by_email(&reset.email)
            .await?
            .ok_or(UserError::InvalidResetToken)?;

        self.student_repo
            .set_password_hash(&reset.email, &hash_password(new_password)?)
            .await?;
        self.reset_repo.delete(token).await?;
        self.session_repo.delete_by_student(student.id).await?;

        tracing::info!(student_id = student.id, "password reset completed");
        Ok(())
    }

    /// Self-service password change for a logged-in student.
    pub async fn change_password(
        &self,
        student_id: i64,
        current: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        if new_password.len() < 8 {
            return Err(UserError::WeakPassword);
        }
        let student = self
            .student_repo
            .find_by_id(student_id)
            .await?
            .ok_or(UserError::StudentNotFound)?;
        if !verify_password(current, &student.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }
        self.student_repo
            .set_password_hash(&student.email, &hash_password(new_password)?)
            .await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        student_id: i64,
        patch: ProfilePatch,
    ) -> Result<Student, UserError> {
        if !patch.is_empty() {
            self.student_repo.update_profile(student_id, &patch).await?;
        }
        self.student_repo
            .find_by_id(student_id)
            .await?
            .ok_or(UserError::StudentNotFound)
    }

    /// Store a profile photo and point the account at it.
    pub async fn upload_photo(
        &self,
        student: &Student,
        data: &[u8],
        mime_type: &str,
    ) -> Result<String, UserError> {
        if !self.upload_config.is_photo_type(mime_type) {
            return Err(UserError::UnsupportedMediaType(mime_type.to_string()));
        }
        let blob = self
            .blob_store
            .store(&student.username, data, mime_type)
            .await?;
        self.student_repo
            .set_photo_url(student.id, &blob.url)
            .await?;
        Ok(blob.url)
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, UserError> {
        Ok(self.student_repo.list_students().await?)
    }

    pub async fn get_student(&self, student_id: i64) -> Result<Student, UserError> {
        self.student_repo
            .find_by_id(student_id)
            .await?
            .ok_or(UserError::StudentNotFound)
    }

    /// Enable or disable an account; disabling also revokes its sessions.
    pub async fn set_active(&self, student_id: i64, active: bool) -> Result<(), UserError> {
        if !self.student_repo.set_active(student_id, active).await? {
            return Err(UserError::StudentNotFound);
        }
        if !active {
            self.session_repo.delete_by_student(student_id).await?;
        }
        Ok(())
    }

    /// Remove an account; attendance rows go with it via the FK cascade.
    pub async fn delete_student(&self, student_id: i64) -> Result<(), UserError> {
        self.session_repo.delete_by_student(student_id).await?;
        if !self.student_repo.delete(student_id).await? {
            return Err(UserError::StudentNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxPasswordResetRepository, SqlxSessionRepository, SqlxStudentRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::storage::LocalBlobStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures reset tokens; fails every send when `broken` is set.
    struct StubNotifier {
        tokens: Mutex<Vec<String>>,
        broken: bool,
    }

    impl StubNotifier {
        fn new(broken: bool) -> Self {
            Self {
                tokens: Mutex::new(Vec::new()),
                broken,
            }
        }
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        async fn send_checkout_reminder(&self, _email: &str, _name: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send_password_reset(&self, _email: &str, token: &str) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("smtp down");
            }
            self.tokens.lock().unwrap().push(token.to_string());
            Ok(())
        }
    }

    struct Fixture {
        service: UserService,
        notifier: Arc<StubNotifier>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(broken_mail: bool) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let notifier = Arc::new(StubNotifier::new(broken_mail));
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let service = UserService::new(
            SqlxStudentRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool),
            notifier.clone(),
            Arc::new(LocalBlobStore::new(dir.path().to_path_buf(), "/uploads".into())),
            Arc::new(UploadConfig::default()),
            AuthConfig::default(),
        );
        Fixture {
            service,
            notifier,
            _dir: dir,
        }
    }

    fn register_input(username: &str) -> RegisterInput {
        RegisterInput {
            full_name: format!("Student {username}"),
            username: username.into(),
            email: format!("{username}@example.com"),
            password: "correct horse".into(),
            course: Some("Rust Systems".into()),
            phone: None,
            mentor_name: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login_roundtrip() {
        let f = fixture(false).await;
        let student = f.service.register(register_input("asha")).await.expect("register");
        assert_eq!(student.role, StudentRole::Student);

        let (session, logged_in) = f
            .service
            .login("asha", "correct horse")
            .await
            .expect("login");
        assert_eq!(logged_in.id, student.id);
        assert!(session.expires_at > Utc::now());

        let resolved = f
            .service
            .validate_session(&session.id)
            .await
            .expect("session resolves");
        assert_eq!(resolved.id, student.id);
    }

    #[tokio::test]
    async fn test_login_by_email_and_bad_password() {
        let f = fixture(false).await;
        f.service.register(register_input("asha")).await.unwrap();

        f.service
            .login("asha@example.com", "correct horse")
            .await
            .expect("email login works");

        let err = f.service.login("asha", "wrong").await.unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_rejected() {
        let f = fixture(false).await;
        f.service.register(register_input("asha")).await.unwrap();

        let err = f.service.register(register_input("asha")).await.unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));

        let mut input = register_input("other");
        input.email = "asha@example.com".into();
        let err = f.service.register(input).await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let f = fixture(false).await;
        f.service.register(register_input("asha")).await.unwrap();
        let (session, _) = f.service.login("asha", "correct horse").await.unwrap();

        f.service.logout(&session.id).await.unwrap();
        let err = f.service.validate_session(&session.id).await.unwrap_err();
        assert!(matches!(err, UserError::InvalidSession));
    }

    #[tokio::test]
    async fn test_deactivated_account_cannot_login_or_use_sessions() {
        let f = fixture(false).await;
        let student = f.service.register(register_input("asha")).await.unwrap();
        let (session, _) = f.service.login("asha", "correct horse").await.unwrap();

        f.service.set_active(student.id, false).await.unwrap();

        let err = f.service.validate_session(&session.id).await.unwrap_err();
        assert!(matches!(err, UserError::InvalidSession));
        let err = f.service.login("asha", "correct horse").await.unwrap_err();
        assert!(matches!(err, UserError::AccountDisabled));
    }

    #[tokio::test]
    async fn test_password_reset_flow_is_single_use() {
        let f = fixture(false).await;
        f.service.register(register_input("asha")).await.unwrap();

        f.service.forgot_password("asha@example.com").await.expect("forgot");
        let token = f.notifier.tokens.lock().unwrap()[0].clone();

        f.service
            .reset_password(&token, "new password 123")
            .await
            .expect("reset");
        f.service.login("asha", "new password 123").await.expect("new password works");

        let err = f
            .service
            .reset_password(&token, "another password")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidResetToken));
    }

    #[tokio::test]
    async fn test_forgot_password_surfaces_delivery_failure() {
        let f = fixture(true).await;
        f.service.register(register_input("asha")).await.unwrap();

        let err = f.service.forgot_password("asha@example.com").await.unwrap_err();
        assert!(matches!(err, UserError::NotificationFailure(_)));
    }

    #[tokio::test]
    async fn test_forgot_password_is_quiet_for_unknown_email() {
        let f = fixture(true).await;
        // even with broken mail, an unknown address reveals nothing
        f.service
            .forgot_password("nobody@example.com")
            .await
            .expect("quiet success");
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent_and_can_login() {
        let f = fixture(false).await;
        f.service.ensure_admin().await.unwrap();
        f.service.ensure_admin().await.unwrap();

        let (_, admin) = f.service.login("admin", "admin123").await.expect("admin login");
        assert_eq!(admin.role, StudentRole::Admin);
    }

    #[tokio::test]
    async fn test_photo_upload_rejects_pdf() {
        let f = fixture(false).await;
        let student = f.service.register(register_input("asha")).await.unwrap();

        let err = f
            .service
            .upload_photo(&student, b"%PDF-1.4", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::UnsupportedMediaType(_)));

        let url = f
            .service
            .upload_photo(&student, &[0xFF, 0xD8, 0xFF], "image/jpeg")
            .await
            .expect("jpeg accepted");
        assert!(url.starts_with("/uploads/asha_"));

        let reloaded = f.service.get_student(student.id).await.unwrap();
        assert_eq!(reloaded.photo_url.as_deref(), Some(url.as_str()));
    }
}
