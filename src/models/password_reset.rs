//! Password-reset token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A one-shot password-reset token mailed to the student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordReset {
    /// Token value (uuid v4)
    pub token: String,
    /// Email the reset was requested for
    pub email: String,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
