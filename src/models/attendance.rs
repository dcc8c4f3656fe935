//! Attendance record model
//!
//! One record per student per local calendar day. The record is created by
//! a check-in (status `InProgress`) or by a remark without a check-in
//! (status `Absent`), moves to `Completed` on checkout, and is forced to
//! `ForgottenCheckout` by the autoclose sweep when the student never
//! checked out.
//!
//! Timestamps are persisted as text and read back through
//! [`crate::time::normalize`]; historical rows may carry naive-UTC or
//! date-only values, so the fields stay raw strings here instead of parsed
//! datetimes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A student's daily session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Unique identifier
    pub id: i64,
    /// Owning student
    pub student_id: i64,
    /// Local calendar day, `YYYY-MM-DD`; unique per student
    pub day: String,
    /// Check-in timestamp as stored (absent for remark-only records)
    pub check_in_time: Option<String>,
    /// Check-out timestamp as stored
    pub check_out_time: Option<String>,
    /// Lifecycle status
    pub status: AttendanceStatus,
    /// Derived session length in hours; 0 when absent or invalid
    pub duration_hours: f64,
    /// Student's task report, filled at checkout
    pub tasks: Option<String>,
    /// Uploaded work-proof reference
    pub proof_url: Option<String>,
    /// Open questions the student wants reviewed
    pub doubts: Option<String>,
    /// Admin or self-authored remark (sick leave etc.)
    pub remarks: Option<String>,
    /// Admin rating, 1-5
    pub rating: Option<i64>,
    /// Admin feedback accompanying the rating
    pub feedback: Option<String>,
    /// Username of the rating admin
    pub rated_by: Option<String>,
}

impl AttendanceRecord {
    /// A fresh in-progress record for a check-in at `now`.
    pub fn checked_in(student_id: i64, day: String, check_in_time: String) -> Self {
        Self {
            id: 0, // set by the database
            student_id,
            day,
            check_in_time: Some(check_in_time),
            check_out_time: None,
            status: AttendanceStatus::InProgress,
            duration_hours: 0.0,
            tasks: None,
            proof_url: None,
            doubts: None,
            remarks: None,
            rating: None,
            feedback: None,
            rated_by: None,
        }
    }

    /// A remark-only record carrying no session.
    pub fn absent_with_remark(student_id: i64, day: String, remark: String) -> Self {
        Self {
            id: 0,
            student_id,
            day,
            check_in_time: None,
            check_out_time: None,
            status: AttendanceStatus::Absent,
            duration_hours: 0.0,
            tasks: None,
            proof_url: None,
            doubts: None,
            remarks: Some(remark),
            rating: None,
            feedback: None,
            rated_by: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AttendanceStatus::InProgress
    }
}

/// Lifecycle status of a daily session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttendanceStatus {
    /// Checked in, not yet checked out
    InProgress,
    /// Checked out normally; duration derived from the pair
    Completed,
    /// Force-closed by the autoclose sweep; duration penalized to 0
    ForgottenCheckout,
    /// No session; record exists only to carry a remark
    #[default]
    Absent,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttendanceStatus::InProgress => "In Progress",
            AttendanceStatus::Completed => "Completed",
            AttendanceStatus::ForgottenCheckout => "Forgot Checkout",
            AttendanceStatus::Absent => "Absent",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In Progress" => Ok(AttendanceStatus::InProgress),
            "Completed" => Ok(AttendanceStatus::Completed),
            "Forgot Checkout" => Ok(AttendanceStatus::ForgottenCheckout),
            "Absent" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}
