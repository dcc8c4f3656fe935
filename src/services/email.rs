//! Email notifier
//!
//! Outbound mail for the two flows that need it: the nightly checkout
//! reminder and the password-reset link. Delivery failures come back as
//! errors, never panics; the scheduler logs and skips them per student,
//! while the forgot-password flow surfaces them to the caller.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Outbound notification channel.
///
/// Abstract so tests can record sends instead of talking SMTP.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Remind a student who is still checked in near the cutoff.
    async fn send_checkout_reminder(&self, email: &str, name: &str) -> Result<()>;

    /// Mail a password-reset link built from `token`.
    async fn send_password_reset(&self, email: &str, token: &str) -> Result<()>;
}

/// SMTP notifier backed by lettre.
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        if self.config.host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .map_err(|e| anyhow!("Invalid from address: {}", e))?,
            )
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(self.config.port)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_checkout_reminder(&self, email: &str, name: &str) -> Result<()> {
        let subject = "Action required: you forgot to check out";
        let body = format!(
            "Hi {},\n\nYour study session for today is still open. Please check out \
             before the lockdown cutoff, or the session will be closed with zero hours.\n\n\
             Studytrack",
            name
        );
        self.send(email, subject, body).await
    }

    async fn send_password_reset(&self, email: &str, token: &str) -> Result<()> {
        let reset_link = format!("{}/reset-password?token={}", self.config.reset_base_url, token);
        let subject = "Reset your password - Studytrack";
        let body = format!(
            "A password reset was requested for this address.\n\n\
             Open the link below within 30 minutes to choose a new password:\n{}\n\n\
             If this was not you, ignore this email.\n\nStudytrack",
            reset_link
        );
        self.send(email, subject, body).await
    }
}
