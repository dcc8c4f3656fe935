//! Auth session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque login token handed to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session token (uuid v4)
    pub id: String,
    /// Owning student account
    pub student_id: i64,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
