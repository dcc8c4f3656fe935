//! Attendance repository
//!
//! Database operations for daily session records. Two queries carry the
//! correctness weight of the whole lifecycle:
//!
//! - `insert` uses `INSERT OR IGNORE` against the UNIQUE(student_id, day)
//!   constraint, so concurrent check-ins race at the store and exactly one
//!   wins; the loser sees `None` and is rejected upstream.
//! - `close_open_for_day` is a single set-based UPDATE filtered on status,
//!   which makes the lockdown sweep idempotent: a re-run matches zero rows.

use crate::models::{AttendanceRecord, AttendanceStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Attendance repository trait
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Insert a record if none exists for its (student, day) pair.
    /// Returns `None` when a record already occupied the slot.
    async fn insert(&self, record: &AttendanceRecord) -> Result<Option<AttendanceRecord>>;

    /// Get a record by id
    async fn find_by_id(&self, id: i64) -> Result<Option<AttendanceRecord>>;

    /// Get a student's record for one local day
    async fn find_by_student_and_day(
        &self,
        student_id: i64,
        day: &str,
    ) -> Result<Option<AttendanceRecord>>;

    /// A student's history, most recent day first, capped at `limit`
    async fn list_by_student(&self, student_id: i64, limit: i64) -> Result<Vec<AttendanceRecord>>;

    /// Every record for one local day
    async fn list_for_day(&self, day: &str) -> Result<Vec<AttendanceRecord>>;

    /// Records still in progress for one local day
    async fn list_open_for_day(&self, day: &str) -> Result<Vec<AttendanceRecord>>;

    /// Complete a session: checkout stamp, derived duration and the task
    /// report land in one update
    async fn complete(
        &self,
        id: i64,
        check_out_time: &str,
        duration_hours: f64,
        tasks: &str,
        proof_url: Option<&str>,
        doubts: Option<&str>,
    ) -> Result<()>;

    /// Force-close every in-progress record for one day, with the system
    /// note landing in the task field; returns how many rows transitioned
    async fn close_open_for_day(&self, day: &str, check_out_time: &str, note: &str) -> Result<u64>;

    /// Attach or replace the remark on a record
    async fn set_remark(&self, id: i64, remark: &str) -> Result<()>;

    /// Attach an admin rating; returns false when the record does not exist
    async fn set_rating(&self, id: i64, rating: i64, feedback: &str, rated_by: &str)
        -> Result<bool>;
}

/// SQLx-based attendance repository implementation
pub struct SqlxAttendanceRepository {
    pool: SqlitePool,
}

impl SqlxAttendanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn AttendanceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AttendanceRepository for SqlxAttendanceRepository {
    async fn insert(&self, record: &AttendanceRecord) -> Result<Option<AttendanceRecord>> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO attendance
                (student_id, day, check_in_time, check_out_time, status, duration_hours,
                 tasks, proof_url, doubts, remarks, rating, feedback, rated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.student_id)
        .bind(&record.day)
        .bind(&record.check_in_time)
        .bind(&record.check_out_time)
        .bind(record.status.to_string())
        .bind(record.duration_hours)
        .bind(&record.tasks)
        .bind(&record.proof_url)
        .bind(&record.doubts)
        .bind(&record.remarks)
        .bind(record.rating)
        .bind(&record.feedback)
        .bind(&record.rated_by)
        .execute(&self.pool)
        .await
        .context("Failed to insert attendance record")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let mut created = record.clone();
        created.id = result.last_insert_rowid();
        Ok(Some(created))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query("SELECT * FROM attendance WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get attendance record by id")?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    async fn find_by_student_and_day(
        &self,
        student_id: i64,
        day: &str,
    ) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query("SELECT * FROM attendance WHERE student_id = ? AND day = ?")
            .bind(student_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get attendance record by student and day")?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    async fn list_by_student(&self, student_id: i64, limit: i64) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM attendance WHERE student_id = ? ORDER BY day DESC LIMIT ?",
        )
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list attendance by student")?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_for_day(&self, day: &str) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query("SELECT * FROM attendance WHERE day = ?")
            .bind(day)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list attendance for day")?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_open_for_day(&self, day: &str) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query("SELECT * FROM attendance WHERE day = ? AND status = ?")
            .bind(day)
            .bind(AttendanceStatus::InProgress.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list open attendance for day")?;

        rows.iter().map(row_to_record).collect()
    }

    async fn complete(
        &self,
        id: i64,
        check_out_time: &str,
        duration_hours: f64,
        tasks: &str,
        proof_url: Option<&str>,
        doubts: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE attendance
            SET check_out_time = ?, status = ?, duration_hours = ?,
                tasks = ?, proof_url = ?, doubts = ?
            WHERE id = ?
            "#,
        )
        .bind(check_out_time)
        .bind(AttendanceStatus::Completed.to_string())
        .bind(duration_hours)
        .bind(tasks)
        .bind(proof_url)
        .bind(doubts)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to complete attendance record")?;

        Ok(())
    }

    async fn close_open_for_day(&self, day: &str, check_out_time: &str, note: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET status = ?, check_out_time = ?, tasks = ?, duration_hours = 0
            WHERE day = ? AND status = ?
            "#,
        )
        .bind(AttendanceStatus::ForgottenCheckout.to_string())
        .bind(check_out_time)
        .bind(note)
        .bind(day)
        .bind(AttendanceStatus::InProgress.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to close open attendance records")?;

        Ok(result.rows_affected())
    }

    async fn set_remark(&self, id: i64, remark: &str) -> Result<()> {
        sqlx::query("UPDATE attendance SET remarks = ? WHERE id = ?")
            .bind(remark)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set remark")?;

        Ok(())
    }

    async fn set_rating(
        &self,
        id: i64,
        rating: i64,
        feedback: &str,
        rated_by: &str,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE attendance SET rating = ?, feedback = ?, rated_by = ? WHERE id = ?")
                .bind(rating)
                .bind(feedback)
                .bind(rated_by)
                .bind(id)
                .execute(&self.pool)
                .await
                .context("Failed to set rating")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AttendanceRecord> {
    let status: String = row.get("status");
    Ok(AttendanceRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        day: row.get("day"),
        check_in_time: row.get("check_in_time"),
        check_out_time: row.get("check_out_time"),
        // Unknown legacy statuses degrade to Absent rather than failing the row
        status: status.parse().unwrap_or_default(),
        duration_hours: row.get("duration_hours"),
        tasks: row.get("tasks"),
        proof_url: row.get("proof_url"),
        doubts: row.get("doubts"),
        remarks: row.get("remarks"),
        rating: row.get("rating"),
        feedback: row.get("feedback"),
        rated_by: row.get("rated_by"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::Student;
    use crate::db::repositories::student::{SqlxStudentRepository, StudentRepository};

    async fn setup() -> (SqlxAttendanceRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let students = SqlxStudentRepository::new(pool.clone());
        let student = students
            .create(&Student::new(
                "Ravi Kumar".into(),
                "ravi".into(),
                "ravi@example.com".into(),
                "$argon2id$stub".into(),
            ))
            .await
            .expect("Failed to create student");

        (SqlxAttendanceRepository::new(pool), student.id)
    }

    fn open_record(student_id: i64, day: &str) -> AttendanceRecord {
        AttendanceRecord::checked_in(
            student_id,
            day.to_string(),
            format!("{}T09:00:00+05:30", day),
        )
    }

    #[tokio::test]
    async fn test_insert_is_insert_if_absent() {
        let (repo, sid) = setup().await;

        let first = repo
            .insert(&open_record(sid, "2024-03-01"))
            .await
            .expect("Failed to insert");
        assert!(first.is_some());
        assert!(first.unwrap().id > 0);

        // same (student, day): the second insert loses silently
        let second = repo.insert(&open_record(sid, "2024-03-01")).await.unwrap();
        assert!(second.is_none());

        // another day is fine
        let other = repo.insert(&open_record(sid, "2024-03-02")).await.unwrap();
        assert!(other.is_some());
    }

    #[tokio::test]
    async fn test_complete_rederives_all_fields() {
        let (repo, sid) = setup().await;
        let rec = repo
            .insert(&open_record(sid, "2024-03-01"))
            .await
            .unwrap()
            .unwrap();

        repo.complete(
            rec.id,
            "2024-03-01T12:30:00+05:30",
            3.5,
            "Finished ownership chapter",
            Some("/uploads/ravi_abc.pdf"),
            None,
        )
        .await
        .expect("Failed to complete");

        let loaded = repo.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AttendanceStatus::Completed);
        assert_eq!(loaded.duration_hours, 3.5);
        assert_eq!(loaded.check_out_time.as_deref(), Some("2024-03-01T12:30:00+05:30"));
        assert_eq!(loaded.proof_url.as_deref(), Some("/uploads/ravi_abc.pdf"));
    }

    #[tokio::test]
    async fn test_close_open_for_day_is_idempotent() {
        let (repo, sid) = setup().await;
        repo.insert(&open_record(sid, "2024-03-01")).await.unwrap();

        let closed = repo
            .close_open_for_day("2024-03-01", "2024-03-01T22:00:00+05:30", "Auto-closed")
            .await
            .expect("Failed to close");
        assert_eq!(closed, 1);

        let loaded = repo
            .find_by_student_and_day(sid, "2024-03-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, AttendanceStatus::ForgottenCheckout);
        assert_eq!(loaded.duration_hours, 0.0);
        assert_eq!(loaded.check_out_time.as_deref(), Some("2024-03-01T22:00:00+05:30"));

        // second sweep matches nothing
        let again = repo
            .close_open_for_day("2024-03-01", "2024-03-01T22:05:00+05:30", "Auto-closed")
            .await
            .unwrap();
        assert_eq!(again, 0);
        let unchanged = repo
            .find_by_student_and_day(sid, "2024-03-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.check_out_time.as_deref(), Some("2024-03-01T22:00:00+05:30"));
    }

    #[tokio::test]
    async fn test_open_listing_filters_by_status() {
        let (repo, sid) = setup().await;
        let rec = repo
            .insert(&open_record(sid, "2024-03-01"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(repo.list_open_for_day("2024-03-01").await.unwrap().len(), 1);

        repo.complete(rec.id, "2024-03-01T12:00:00+05:30", 3.0, "done", None, None)
            .await
            .unwrap();
        assert!(repo.list_open_for_day("2024-03-01").await.unwrap().is_empty());
        assert_eq!(repo.list_for_day("2024-03-01").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first_and_capped() {
        let (repo, sid) = setup().await;
        for day in ["2024-03-01", "2024-03-02", "2024-03-03"] {
            repo.insert(&open_record(sid, day)).await.unwrap();
        }

        let history = repo.list_by_student(sid, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].day, "2024-03-03");
        assert_eq!(history[1].day, "2024-03-02");
    }

    #[tokio::test]
    async fn test_rating_and_remark() {
        let (repo, sid) = setup().await;
        let rec = repo
            .insert(&open_record(sid, "2024-03-01"))
            .await
            .unwrap()
            .unwrap();

        assert!(repo.set_rating(rec.id, 4, "Good focus", "admin").await.unwrap());
        repo.set_remark(rec.id, "Left early, informed mentor").await.unwrap();

        let loaded = repo.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.rating, Some(4));
        assert_eq!(loaded.rated_by.as_deref(), Some("admin"));
        assert_eq!(loaded.remarks.as_deref(), Some("Left early, informed mentor"));

        // rating a missing record reports not-found
        assert!(!repo.set_rating(9999, 5, "x", "admin").await.unwrap());
    }
}
