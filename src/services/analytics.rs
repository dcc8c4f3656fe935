//! Productivity aggregation
//!
//! Folds a student's attendance history into a `{today, week, month,
//! lifetime}` snapshot. Everything is re-derived from stored records and
//! the injected clock on every call; there are no cached counters, so two
//! reads with no intervening writes return identical snapshots.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::db::repositories::AttendanceRepository;
use crate::models::{AttendanceRecord, AttendanceStatus};
use crate::time::{self, Clock};

/// Generous fetch cap; history beyond this is a known dashboard
/// limitation, not a correctness concern.
const AGGREGATION_CAP: i64 = 2000;

/// Errors from the analytics service
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Today's slice of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayStats {
    pub hours: f64,
    /// "Live" while a session is still open, otherwise the stored status
    /// of today's record, "Absent" when there is none.
    pub status: String,
}

/// Hours plus distinct-days-present over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub hours: f64,
    pub days_present: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifetimeStats {
    pub hours: f64,
    pub days_present: u32,
    pub sessions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivitySnapshot {
    pub today: TodayStats,
    pub week: PeriodStats,
    pub month: PeriodStats,
    pub lifetime: LifetimeStats,
}

/// Running totals for one bucket while folding records.
#[derive(Default)]
struct Bucket {
    hours: f64,
    days: HashSet<NaiveDate>,
}

impl Bucket {
    fn add(&mut self, hours: f64, date: NaiveDate, present: bool) {
        self.hours += hours;
        if present {
            self.days.insert(date);
        }
    }
}

/// Productivity aggregation service
pub struct AnalyticsService {
    attendance_repo: Arc<dyn AttendanceRepository>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(attendance_repo: Arc<dyn AttendanceRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            attendance_repo,
            clock,
        }
    }

    /// Build the full snapshot for one student.
    pub async fn snapshot(&self, student_id: i64) -> Result<ProductivitySnapshot, AnalyticsError> {
        let records = self
            .attendance_repo
            .list_by_student(student_id, AGGREGATION_CAP)
            .await?;

        let now = self.clock.now();
        let tz = self.clock.tz();
        let today_start = time::day_start(now);
        let week_start = time::week_start(now);
        let month_start = time::month_start(now);
        let today_date = now.date_naive();

        let mut today = Bucket::default();
        let mut week = Bucket::default();
        let mut month = Bucket::default();
        let mut lifetime = Bucket::default();
        let mut sessions: u32 = 0;
        let mut today_status: Option<String> = None;
        let mut today_live = false;

        for record in &records {
            let Some(check_in) = resolve_check_in(record, tz) else {
                // Unresolvable timestamp; skip rather than poison totals.
                tracing::debug!(record_id = record.id, "skipping record with unresolvable check-in");
                continue;
            };

            let check_out = record
                .check_out_time
                .as_deref()
                .and_then(|raw| time::normalize(raw, tz));

            let is_today = check_in.date_naive() == today_date;
            let (hours, live) = if record.status == AttendanceStatus::ForgottenCheckout {
                // Forced close is a zero-hour penalty; the stamped
                // checkout marks when the sweep ran, not time worked.
                (0.0, false)
            } else {
                match check_out {
                    Some(out) => (time::session_hours(check_in, out), false),
                    // Open session from today counts live elapsed time;
                    // a stale open one from a past day contributes nothing
                    // (the lockdown sweep owns its fate).
                    None if is_today => (time::session_hours(check_in, now), true),
                    None => (0.0, false),
                }
            };

            sessions += 1;
            let present = hours > 0.0 || live;
            let date = check_in.date_naive();

            lifetime.add(hours, date, present);
            if check_in >= month_start {
                month.add(hours, date, present);
            }
            if check_in >= week_start {
                week.add(hours, date, present);
            }
            if check_in >= today_start {
                today.add(hours, date, present);
                today_live |= record.is_open();
                if today_status.is_none() {
                    today_status = Some(record.status.to_string());
                }
            }
        }

        Ok(ProductivitySnapshot {
            today: TodayStats {
                hours: time::round_hours(today.hours),
                status: if today_live {
                    "Live".to_string()
                } else {
                    today_status.unwrap_or_else(|| AttendanceStatus::Absent.to_string())
                },
            },
            week: PeriodStats {
                hours: time::round_hours(week.hours),
                days_present: week.days.len() as u32,
            },
            month: PeriodStats {
                hours: time::round_hours(month.hours),
                days_present: month.days.len() as u32,
            },
            lifetime: LifetimeStats {
                hours: time::round_hours(lifetime.hours),
                days_present: lifetime.days.len() as u32,
                sessions,
            },
        })
    }
}

/// Check-in instant for aggregation, falling back to the record's day
/// (interpreted as local midnight) when no check-in time was stored.
fn resolve_check_in(record: &AttendanceRecord, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    record
        .check_in_time
        .as_deref()
        .and_then(|raw| time::normalize(raw, tz))
        .or_else(|| time::normalize(&record.day, tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAttendanceRepository, SqlxStudentRepository, StudentRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Student;
    use crate::time::ManualClock;

    struct Fixture {
        repo: Arc<dyn AttendanceRepository>,
        service: AnalyticsService,
        student_id: i64,
    }

    /// Fresh database with one student; clock pinned to the given instant.
    async fn fixture(now: &str) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let students = SqlxStudentRepository::new(pool.clone());
        let student = students
            .create(&Student::new(
                "Asha Patel".into(),
                "asha".into(),
                "asha@example.com".into(),
                "hash".into(),
            ))
            .await
            .expect("Failed to create student");

        let repo = SqlxAttendanceRepository::boxed(pool);
        let service = AnalyticsService::new(repo.clone(), Arc::new(ManualClock::at(now)));
        Fixture {
            repo,
            service,
            student_id: student.id,
        }
    }

    async fn insert_completed(f: &Fixture, day: &str, check_in: &str, check_out: &str, hours: f64) {
        let record = AttendanceRecord::checked_in(f.student_id, day.into(), check_in.into());
        let created = f
            .repo
            .insert(&record)
            .await
            .expect("insert")
            .expect("day free");
        f.repo
            .complete(created.id, check_out, hours, "tasks", None, None)
            .await
            .expect("complete");
    }

    #[tokio::test]
    async fn test_empty_history_is_all_zeroes_and_absent() {
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");

        assert_eq!(snap.today.hours, 0.0);
        assert_eq!(snap.today.status, "Absent");
        assert_eq!(snap.week.days_present, 0);
        assert_eq!(snap.lifetime.sessions, 0);
    }

    #[tokio::test]
    async fn test_forgotten_checkout_day_is_not_present() {
        // Completed 2h today (Wednesday); forced-closed 0h session on
        // Monday of the same week. Week shows 2.0h over a single day.
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        insert_completed(
            &f,
            "2024-03-06",
            "2024-03-06T09:00:00+05:30",
            "2024-03-06T11:00:00+05:30",
            2.0,
        )
        .await;

        let monday = AttendanceRecord::checked_in(
            f.student_id,
            "2024-03-04".into(),
            "2024-03-04T09:00:00+05:30".into(),
        );
        f.repo.insert(&monday).await.expect("insert").expect("day free");
        f.repo
            .close_open_for_day("2024-03-04", "2024-03-04T22:00:00+05:30", "Auto-closed")
            .await
            .expect("close");

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.week.hours, 2.0);
        assert_eq!(snap.week.days_present, 1);
        assert_eq!(snap.lifetime.hours, 2.0);
        assert_eq!(snap.lifetime.sessions, 2);
        assert_eq!(snap.today.status, "Completed");
    }

    #[tokio::test]
    async fn test_forced_close_stamp_never_counts_as_hours() {
        // 09:00 check-in force-closed at 22:00 the same day: the 13-hour
        // stamp interval must not show up anywhere in the totals.
        let f = fixture("2024-03-06T23:00:00+05:30").await;
        let record = AttendanceRecord::checked_in(
            f.student_id,
            "2024-03-06".into(),
            "2024-03-06T09:00:00+05:30".into(),
        );
        f.repo.insert(&record).await.expect("insert").expect("day free");
        f.repo
            .close_open_for_day("2024-03-06", "2024-03-06T22:00:00+05:30", "Auto-closed")
            .await
            .expect("close");

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.today.hours, 0.0);
        assert_eq!(snap.today.status, "Forgot Checkout");
        assert_eq!(snap.week.hours, 0.0);
        assert_eq!(snap.week.days_present, 0);
        assert_eq!(snap.lifetime.hours, 0.0);
    }

    #[tokio::test]
    async fn test_live_session_counts_elapsed_time_toward_today() {
        let f = fixture("2024-03-06T12:30:00+05:30").await;
        let record = AttendanceRecord::checked_in(
            f.student_id,
            "2024-03-06".into(),
            "2024-03-06T09:00:00+05:30".into(),
        );
        f.repo.insert(&record).await.expect("insert").expect("day free");

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.today.hours, 3.5);
        assert_eq!(snap.today.status, "Live");
        assert_eq!(snap.week.days_present, 1);
    }

    #[tokio::test]
    async fn test_stale_open_session_contributes_zero() {
        // Open record from yesterday, never closed. It must not inflate
        // totals even though "now - check_in" would be a day and a half.
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        let record = AttendanceRecord::checked_in(
            f.student_id,
            "2024-03-05".into(),
            "2024-03-05T09:00:00+05:30".into(),
        );
        f.repo.insert(&record).await.expect("insert").expect("day free");

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.week.hours, 0.0);
        assert_eq!(snap.week.days_present, 0);
        assert_eq!(snap.today.status, "Absent");
    }

    #[tokio::test]
    async fn test_week_boundary_excludes_last_sunday() {
        // Wednesday 2024-03-06; the week started Monday 2024-03-04.
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        insert_completed(
            &f,
            "2024-03-03",
            "2024-03-03T09:00:00+05:30",
            "2024-03-03T12:00:00+05:30",
            3.0,
        )
        .await;
        insert_completed(
            &f,
            "2024-03-04",
            "2024-03-04T09:00:00+05:30",
            "2024-03-04T10:00:00+05:30",
            1.0,
        )
        .await;

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.week.hours, 1.0);
        assert_eq!(snap.month.hours, 4.0);
        assert_eq!(snap.lifetime.hours, 4.0);
        assert_eq!(snap.lifetime.days_present, 2);
    }

    #[tokio::test]
    async fn test_naive_check_in_is_read_as_utc() {
        // 03:30 naive = 03:30 UTC = 09:00 IST; checkout 07:00 UTC = 12:30
        // IST, so the session is 3.5 hours on the local ledger.
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        insert_completed(
            &f,
            "2024-03-06",
            "2024-03-06T03:30:00",
            "2024-03-06T07:00:00",
            3.5,
        )
        .await;

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.today.hours, 3.5);
        assert_eq!(snap.today.status, "Completed");
    }

    #[tokio::test]
    async fn test_snapshot_is_deterministic() {
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        insert_completed(
            &f,
            "2024-03-06",
            "2024-03-06T09:00:00+05:30",
            "2024-03-06T11:00:00+05:30",
            2.0,
        )
        .await;

        let first = f.service.snapshot(f.student_id).await.expect("snapshot");
        let second = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_garbage_check_in_is_skipped() {
        let f = fixture("2024-03-06T15:00:00+05:30").await;
        let mut record = AttendanceRecord::checked_in(
            f.student_id,
            "not-a-date".into(),
            "garbage".into(),
        );
        record.check_in_time = Some("garbage".into());
        f.repo.insert(&record).await.expect("insert").expect("day free");

        let snap = f.service.snapshot(f.student_id).await.expect("snapshot");
        assert_eq!(snap.lifetime.sessions, 0);
        assert_eq!(snap.lifetime.hours, 0.0);
    }
}
