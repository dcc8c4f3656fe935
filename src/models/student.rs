//! Student model
//!
//! A student is the owner of attendance records. The optional profile
//! fields (course, phone, address, mentor) are filled in gradually from the
//! profile page and may be absent for older accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Student entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub full_name: String,
    /// Username (unique)
    pub username: String,
    /// Email address (unique); reminders go here
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account role
    pub role: StudentRole,
    /// Deactivated accounts cannot log in
    pub is_active: bool,
    /// Enrolled course
    pub course: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Assigned mentor
    pub mentor_name: Option<String>,
    /// Profile photo reference
    pub photo_url: Option<String>,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Create a new student with the given credentials.
    ///
    /// The password must already be hashed; use
    /// `services::password::hash_password`.
    pub fn new(full_name: String, username: String, email: String, password_hash: String) -> Self {
        Self {
            id: 0, // set by the database
            full_name,
            username,
            email,
            password_hash,
            role: StudentRole::Student,
            is_active: true,
            course: None,
            phone: None,
            address: None,
            mentor_name: None,
            photo_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == StudentRole::Admin
    }
}

/// Account role.
///
/// Admins review logs, add remarks and rate work; students check in and
/// out of their own sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentRole {
    /// Regular student account
    #[default]
    Student,
    /// Administrator
    Admin,
}

impl fmt::Display for StudentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentRole::Student => write!(f, "student"),
            StudentRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for StudentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(StudentRole::Student),
            "admin" => Ok(StudentRole::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_student_defaults() {
        let s = Student::new(
            "Asha Verma".into(),
            "asha".into(),
            "asha@example.com".into(),
            "$argon2id$stub".into(),
        );
        assert_eq!(s.role, StudentRole::Student);
        assert!(s.is_active);
        assert!(!s.is_admin());
        assert!(s.course.is_none());
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!("admin".parse::<StudentRole>().unwrap(), StudentRole::Admin);
        assert_eq!(StudentRole::Student.to_string(), "student");
        assert!("mentor".parse::<StudentRole>().is_err());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let s = Student::new("A".into(), "a".into(), "a@x.com".into(), "secret".into());
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("secret"));
    }
}
