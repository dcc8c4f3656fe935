//! Password-reset token repository

use crate::models::PasswordReset;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Password-reset repository trait
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Store a new reset token
    async fn create(&self, reset: &PasswordReset) -> Result<()>;

    /// Look up a token
    async fn find_by_token(&self, token: &str) -> Result<Option<PasswordReset>>;

    /// Consume a token
    async fn delete(&self, token: &str) -> Result<()>;

    /// Drop expired tokens
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based password-reset repository implementation
pub struct SqlxPasswordResetRepository {
    pool: SqlitePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(&self, reset: &PasswordReset) -> Result<()> {
        sqlx::query(
            "INSERT INTO password_resets (token, email, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&reset.token)
        .bind(&reset.email)
        .bind(reset.expires_at)
        .bind(reset.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create password reset")?;

        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<PasswordReset>> {
        let row = sqlx::query(
            "SELECT token, email, expires_at, created_at FROM password_resets WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get password reset")?;

        match row {
            Some(row) => Ok(Some(PasswordReset {
                token: row.get("token"),
                email: row.get("email"),
                expires_at: row.get("expires_at"),
                created_at: row.get("created_at"),
            })),
            None => Ok(None),
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM password_resets WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to delete password reset")?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let result = sqlx::query("DELETE FROM password_resets WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to delete expired password resets")?;

        Ok(result.rows_affected() as i64)
    }
}
