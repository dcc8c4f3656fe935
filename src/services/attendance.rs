//! Attendance lifecycle service
//!
//! Implements the one-session-per-day state machine:
//!
//! - check-in opens today's record (`InProgress`), at most one per student
//!   per local day
//! - check-out completes it, deriving the duration from the stored
//!   check-in to "now"
//! - a remark without a check-in creates an `Absent` record, or merges
//!   into whatever record exists without touching its status
//! - `ForgottenCheckout` is reachable only through the autoclose sweep,
//!   never from here
//!
//! All timestamps pass through [`crate::time`]; the service never does its
//! own timezone math.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::UploadConfig;
use crate::db::repositories::AttendanceRepository;
use crate::models::{AttendanceRecord, AttendanceStatus};
use crate::services::storage::{BlobStore, StoredBlob};
use crate::time::{self, Clock};

/// History fetch cap; roughly a year of dailies.
const HISTORY_LIMIT: i64 = 365;

/// Error types for attendance operations
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// A session already exists for this student today
    #[error("You have already checked in today. One focused session per day.")]
    DuplicateSession,

    /// Check-out without an open session
    #[error("No active session found for today.")]
    NoActiveSession,

    /// Check-out on a session that is already done
    #[error("Session already completed.")]
    AlreadyCompleted,

    /// Check-out before check-in; the clock went backwards somewhere
    #[error("Invalid duration: check-out precedes check-in.")]
    InvalidDuration,

    /// Upload with a MIME type outside the allow-list
    #[error("Unsupported file type: {0}. Only JPEG, PNG and PDF are accepted.")]
    UnsupportedMediaType(String),

    /// Rating outside 1-5
    #[error("Rating must be between 1 and 5.")]
    InvalidRating,

    /// Target record does not exist
    #[error("Attendance record not found.")]
    RecordNotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Student-supplied checkout payload.
#[derive(Debug, Clone)]
pub struct CheckOutInput {
    /// What was worked on today
    pub tasks: String,
    /// Reference returned by a prior proof upload
    pub proof_url: Option<String>,
    /// Open questions for the mentor
    pub doubts: Option<String>,
}

/// Attendance lifecycle service
pub struct AttendanceService {
    attendance_repo: Arc<dyn AttendanceRepository>,
    blob_store: Arc<dyn BlobStore>,
    upload_config: Arc<UploadConfig>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(
        attendance_repo: Arc<dyn AttendanceRepository>,
        blob_store: Arc<dyn BlobStore>,
        upload_config: Arc<UploadConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            attendance_repo,
            blob_store,
            upload_config,
            clock,
        }
    }

    /// Open today's session.
    ///
    /// The insert races at the store against the UNIQUE(student, day)
    /// constraint, so two concurrent check-ins cannot both win.
    pub async fn check_in(&self, student_id: i64) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let day = now.format("%Y-%m-%d").to_string();
        let record = AttendanceRecord::checked_in(student_id, day, now.to_rfc3339());

        match self.attendance_repo.insert(&record).await? {
            Some(created) => {
                tracing::info!(student_id, day = %created.day, "check-in");
                Ok(created)
            }
            None => Err(AttendanceError::DuplicateSession),
        }
    }

    /// Close today's session with a task report.
    ///
    /// Duration is derived from the stored check-in to "now", rounded to
    /// 2 decimals. A negative interval is rejected; an interval past the
    /// 18-hour ceiling is treated as corrupt and zeroed.
    pub async fn check_out(
        &self,
        student_id: i64,
        input: CheckOutInput,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let day = now.format("%Y-%m-%d").to_string();

        let record = self
            .attendance_repo
            .find_by_student_and_day(student_id, &day)
            .await?
            .ok_or(AttendanceError::NoActiveSession)?;

        if record.status == AttendanceStatus::Completed {
            return Err(AttendanceError::AlreadyCompleted);
        }

        let check_in = record
            .check_in_time
            .as_deref()
            .and_then(|raw| time::normalize(raw, self.clock.tz()))
            .ok_or(AttendanceError::NoActiveSession)?;

        if now < check_in {
            return Err(AttendanceError::InvalidDuration);
        }

        let hours = time::session_hours(check_in, now);
        if hours == 0.0 && (now - check_in).num_seconds() >= time::MAX_SESSION_SECS {
            tracing::warn!(
                student_id,
                record_id = record.id,
                "session exceeded sanity ceiling, zeroing duration"
            );
        }

        self.attendance_repo
            .complete(
                record.id,
                &now.to_rfc3339(),
                hours,
                &input.tasks,
                input.proof_url.as_deref(),
                input.doubts.as_deref(),
            )
            .await?;

        tracing::info!(student_id, hours, "check-out");

        self.attendance_repo
            .find_by_id(record.id)
            .await?
            .ok_or(AttendanceError::RecordNotFound)
    }

    /// Attach a remark to a (student, date) pair.
    ///
    /// Merges into an existing record without altering its status; when no
    /// record exists, creates an `Absent` one so the reason shows up on
    /// the roster.
    pub async fn add_remark(
        &self,
        student_id: i64,
        date: NaiveDate,
        remark: &str,
    ) -> Result<(), AttendanceError> {
        let day = date.format("%Y-%m-%d").to_string();

        if let Some(existing) = self
            .attendance_repo
            .find_by_student_and_day(student_id, &day)
            .await?
        {
            self.attendance_repo.set_remark(existing.id, remark).await?;
            return Ok(());
        }

        let record = AttendanceRecord::absent_with_remark(student_id, day, remark.to_string());
        if self.attendance_repo.insert(&record).await?.is_none() {
            // Lost a race with a concurrent writer; merge into theirs.
            if let Some(existing) = self
                .attendance_repo
                .find_by_student_and_day(student_id, &record.day)
                .await?
            {
                self.attendance_repo.set_remark(existing.id, remark).await?;
            }
        }
        Ok(())
    }

    /// Admin rating of a day's work.
    pub async fn rate(
        &self,
        record_id: i64,
        rating: i64,
        feedback: &str,
        rated_by: &str,
    ) -> Result<(), AttendanceError> {
        if !(1..=5).contains(&rating) {
            return Err(AttendanceError::InvalidRating);
        }

        if !self
            .attendance_repo
            .set_rating(record_id, rating, feedback, rated_by)
            .await?
        {
            return Err(AttendanceError::RecordNotFound);
        }
        Ok(())
    }

    /// Today's record for a student, if one exists.
    pub async fn today(
        &self,
        student_id: i64,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let day = self.clock.now().format("%Y-%m-%d").to_string();
        Ok(self
            .attendance_repo
            .find_by_student_and_day(student_id, &day)
            .await?)
    }

    /// A student's attendance history, most recent day first.
    pub async fn history(&self, student_id: i64) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        Ok(self
            .attendance_repo
            .list_by_student(student_id, HISTORY_LIMIT)
            .await?)
    }

    /// Store an uploaded work proof after validating its MIME type.
    pub async fn upload_proof(
        &self,
        owner: &str,
        data: &[u8],
        mime_type: &str,
    ) -> Result<StoredBlob, AttendanceError> {
        if !self.upload_config.is_proof_type(mime_type) {
            return Err(AttendanceError::UnsupportedMediaType(mime_type.to_string()));
        }
        Ok(self.blob_store.store(owner, data, mime_type).await?)
    }
}
