//! Daily roster reporting
//!
//! Read-only projection joining the enrollment roster against one local
//! day's attendance records. Students without a record for the day show up
//! as `Absent` so the admin view always covers the whole roster.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::db::repositories::{AttendanceRepository, StudentRepository};
use crate::models::{AttendanceRecord, AttendanceStatus};
use crate::time::{self, Clock};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to render CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// One roster row, one student.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub student_id: i64,
    pub full_name: String,
    pub username: String,
    pub status: String,
    /// Local wall-clock time, e.g. "09:00 AM"
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub duration_hours: f64,
    pub tasks: Option<String>,
    pub proof_url: Option<String>,
    pub doubts: Option<String>,
    pub remarks: Option<String>,
    pub rating: Option<i64>,
}

/// Daily roster service
pub struct ReportService {
    attendance_repo: Arc<dyn AttendanceRepository>,
    student_repo: Arc<dyn StudentRepository>,
    clock: Arc<dyn Clock>,
}

impl ReportService {
    pub fn new(
        attendance_repo: Arc<dyn AttendanceRepository>,
        student_repo: Arc<dyn StudentRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            attendance_repo,
            student_repo,
            clock,
        }
    }

    /// Today's local calendar date.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Roster for one local date, ordered by student name.
    pub async fn daily_roster(&self, date: NaiveDate) -> Result<Vec<RosterEntry>, ReportError> {
        let day = date.format("%Y-%m-%d").to_string();
        let students = self.student_repo.list_students().await?;
        let records = self.attendance_repo.list_for_day(&day).await?;

        let mut by_student: HashMap<i64, AttendanceRecord> = records
            .into_iter()
            .map(|r| (r.student_id, r))
            .collect();

        let tz = self.clock.tz();
        let roster = students
            .into_iter()
            .map(|student| match by_student.remove(&student.id) {
                Some(record) => RosterEntry {
                    student_id: student.id,
                    full_name: student.full_name,
                    username: student.username,
                    status: record.status.to_string(),
                    check_in: local_clock(record.check_in_time.as_deref(), tz),
                    check_out: local_clock(record.check_out_time.as_deref(), tz),
                    duration_hours: record.duration_hours,
                    tasks: record.tasks,
                    proof_url: record.proof_url,
                    doubts: record.doubts,
                    remarks: record.remarks,
                    rating: record.rating,
                },
                None => RosterEntry {
                    student_id: student.id,
                    full_name: student.full_name,
                    username: student.username,
                    status: AttendanceStatus::Absent.to_string(),
                    check_in: None,
                    check_out: None,
                    duration_hours: 0.0,
                    tasks: None,
                    proof_url: None,
                    doubts: None,
                    remarks: None,
                    rating: None,
                },
            })
            .collect();

        Ok(roster)
    }

    /// Roster rendered as CSV for download.
    pub async fn daily_roster_csv(&self, date: NaiveDate) -> Result<Vec<u8>, ReportError> {
        let roster = self.daily_roster(date).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "Name", "Username", "Status", "Check In", "Check Out", "Hours", "Tasks", "Proof",
            "Doubts", "Remarks", "Rating",
        ])?;

        for entry in &roster {
            writer.write_record([
                entry.full_name.as_str(),
                entry.username.as_str(),
                entry.status.as_str(),
                entry.check_in.as_deref().unwrap_or(""),
                entry.check_out.as_deref().unwrap_or(""),
                &format!("{:.2}", entry.duration_hours),
                entry.tasks.as_deref().unwrap_or(""),
                entry.proof_url.as_deref().unwrap_or(""),
                entry.doubts.as_deref().unwrap_or(""),
                entry.remarks.as_deref().unwrap_or(""),
                &entry.rating.map(|r| r.to_string()).unwrap_or_default(),
            ])?;
        }

        writer
            .into_inner()
            .map_err(|e| ReportError::Internal(anyhow::anyhow!("CSV flush failed: {e}")))
    }
}

/// Present a stored timestamp as local 12-hour wall time.
fn local_clock(raw: Option<&str>, tz: FixedOffset) -> Option<String> {
    raw.and_then(|r| time::normalize(r, tz))
        .map(|dt: DateTime<FixedOffset>| dt.format("%I:%M %p").to_string())
}
