//! End-of-day autoclose sweeps
//!
//! Two daily jobs keyed to local-time cutoffs:
//!
//! - **warn** (21:30 by default): email every student whose session is
//!   still open a checkout reminder. One student's delivery failure is
//!   logged and skipped; it never aborts the sweep.
//! - **lockdown** (22:00 by default): force-close every still-open record
//!   for the day to `ForgottenCheckout` with duration 0 in one set-based
//!   update. Re-running is harmless since already-closed records fall
//!   outside the status filter.
//!
//! Lockdown only inspects current status, so ordering relative to warn is
//! a courtesy, not a correctness requirement.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Timelike};

use crate::config::ScheduleConfig;
use crate::db::repositories::{AttendanceRepository, StudentRepository};
use crate::services::email::Notifier;
use crate::time::Clock;

const LOCKDOWN_NOTE: &str = "Auto-closed by system: checkout was not recorded";

pub struct AutocloseScheduler {
    attendance_repo: Arc<dyn AttendanceRepository>,
    student_repo: Arc<dyn StudentRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    schedule: ScheduleConfig,
}

impl AutocloseScheduler {
    pub fn new(
        attendance_repo: Arc<dyn AttendanceRepository>,
        student_repo: Arc<dyn StudentRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            attendance_repo,
            student_repo,
            notifier,
            clock,
            schedule,
        }
    }

    /// Remind every student with an open session today. Returns how many
    /// reminders were actually delivered.
    pub async fn run_warn_sweep(&self) -> anyhow::Result<u32> {
        let day = self.clock.now().format("%Y-%m-%d").to_string();
        let open = self.attendance_repo.list_open_for_day(&day).await?;
        tracing::info!(day = %day, open = open.len(), "warn sweep start");

        let mut delivered = 0;
        for record in &open {
            let student = match self.student_repo.find_by_id(record.student_id).await {
                Ok(Some(student)) => student,
                Ok(None) => {
                    tracing::warn!(student_id = record.student_id, "open record for unknown student");
                    continue;
                }
                Err(err) => {
                    tracing::error!(student_id = record.student_id, error = %err, "student lookup failed");
                    continue;
                }
            };

            if student.email.is_empty() {
                continue;
            }

            match self
                .notifier
                .send_checkout_reminder(&student.email, &student.full_name)
                .await
            {
                Ok(()) => delivered += 1,
                Err(err) => {
                    // Per-student failure; the rest of the batch proceeds.
                    tracing::warn!(student_id = student.id, error = %err, "reminder delivery failed");
                }
            }
        }

        tracing::info!(day = %day, delivered, "warn sweep done");
        Ok(delivered)
    }

    /// Force-close today's open sessions. Returns how many records were
    /// transitioned; zero on a re-run.
    pub async fn run_lockdown_sweep(&self) -> anyhow::Result<u64> {
        let now = self.clock.now();
        let day = now.format("%Y-%m-%d").to_string();

        let closed = self
            .attendance_repo
            .close_open_for_day(&day, &now.to_rfc3339(), LOCKDOWN_NOTE)
            .await?;

        tracing::info!(day = %day, closed, "lockdown sweep done");
        Ok(closed)
    }

    /// Spawn the two daily timer loops. Each sleeps until its next local
    /// cutoff, runs its sweep, and reschedules for the following day.
    pub fn spawn(self: Arc<Self>) -> anyhow::Result<()> {
        let warn_at = self.schedule.warn_cutoff()?;
        let lockdown_at = self.schedule.lockdown_cutoff()?;

        let warn = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(warn.sleep_until(warn_at)).await;
                if let Err(err) = warn.run_warn_sweep().await {
                    tracing::error!(error = %err, "warn sweep failed");
                }
            }
        });

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.sleep_until(lockdown_at)).await;
                if let Err(err) = self.run_lockdown_sweep().await {
                    tracing::error!(error = %err, "lockdown sweep failed");
                }
            }
        });

        Ok(())
    }

    /// Wall-clock duration until the next local occurrence of `HH:MM`.
    fn sleep_until(&self, (hour, minute): (u32, u32)) -> StdDuration {
        let now = self.clock.now();
        let mut target = now
            .with_hour(hour)
            .and_then(|t| t.with_minute(minute))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        if target <= now {
            target += Duration::days(1);
        }
        (target - now).to_std().unwrap_or(StdDuration::from_secs(60))
    }
}
