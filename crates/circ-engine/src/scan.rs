//! # Due-Date Scan
//!
//! The recurring sweep over active borrows: due-soon reminders and overdue
//! notices.
//!
//! ## Design
//! - `run(now)` takes the date explicitly, so a timer, a cron job, or a
//!   test can drive it without a wall clock
//! - best-effort: one member's failure is recorded and the sweep moves on
//! - idempotent per record: a record with an un-failed notification of the
//!   same category is skipped, so a daily schedule doesn't spam
//! - non-transactional with delivery; the outbox row is the audit

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

use circ_core::{BorrowRecord, LendingResult, NotificationCategory, NotificationStatus};
use circ_db::Database;

use crate::members::MemberDirectory;
use crate::notify::{NotificationEvent, NotificationSink, Outbox};
use crate::settings::SettingsProvider;

/// What one sweep did.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Due-soon reminders issued.
    pub due_soon: usize,
    /// Overdue notices issued.
    pub overdue: usize,
    /// Records skipped because a notice already exists.
    pub skipped: usize,
    /// Per-record failures (missing member, delivery errors). The sweep
    /// continued past every one of these.
    pub failures: Vec<String>,
}

/// The schedulable due/overdue sweep.
#[derive(Clone)]
pub struct DueDateScan {
    db: Database,
    settings: Arc<dyn SettingsProvider>,
    directory: Arc<dyn MemberDirectory>,
    outbox: Outbox,
}

impl DueDateScan {
    pub fn new(
        db: Database,
        settings: Arc<dyn SettingsProvider>,
        directory: Arc<dyn MemberDirectory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        DueDateScan {
            outbox: Outbox::new(db.clone(), sink),
            db,
            settings,
            directory,
        }
    }

    /// Runs one sweep as of `now`.
    pub async fn run(&self, now: NaiveDate) -> LendingResult<ScanReport> {
        let policy = self.settings.policy().await?;
        let mut report = ScanReport::default();

        // Books due within the reminder window, today included
        let due_soon = self
            .db
            .borrows()
            .approved_due_between(now, now + Duration::days(policy.due_reminder_days))
            .await?;

        // Books at least overdue_reminder_days past due
        let overdue = self
            .db
            .borrows()
            .approved_overdue(now - Duration::days(policy.overdue_reminder_days - 1))
            .await?;

        for record in due_soon {
            self.process(&record, NotificationCategory::DueSoon, &mut report)
                .await?;
        }
        for record in overdue {
            self.process(&record, NotificationCategory::Overdue, &mut report)
                .await?;
        }

        info!(
            %now,
            due_soon = report.due_soon,
            overdue = report.overdue,
            skipped = report.skipped,
            failures = report.failures.len(),
            "due-date scan complete"
        );
        Ok(report)
    }

    /// Issues one notice; failures land in the report, never abort the
    /// sweep.
    async fn process(
        &self,
        record: &BorrowRecord,
        category: NotificationCategory,
        report: &mut ScanReport,
    ) -> LendingResult<()> {
        if self.outbox.already_issued(category, &record.id).await? {
            report.skipped += 1;
            return Ok(());
        }

        let member = match self.directory.find(&record.member_id).await? {
            Some(member) => member,
            None => {
                warn!(record_id = %record.id, member_id = %record.member_id,
                      "scan: member missing, skipping record");
                report
                    .failures
                    .push(format!("record {}: member {} not found", record.id, record.member_id));
                return Ok(());
            }
        };

        let event = match category {
            NotificationCategory::DueSoon => {
                NotificationEvent::due_soon(member, &record.id, record.due_date)
            }
            _ => NotificationEvent::overdue(member, &record.id, record.due_date),
        };

        let notification = self.outbox.dispatch(event).await?;
        if notification.status == NotificationStatus::Failed {
            report.failures.push(format!(
                "record {}: delivery failed ({})",
                record.id,
                notification.error_message.as_deref().unwrap_or("unknown")
            ));
        }

        match category {
            NotificationCategory::DueSoon => report.due_soon += 1,
            _ => report.overdue += 1,
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::DbMemberDirectory;
    use crate::settings::StaticSettings;
    use crate::testutil::{recording_sink, seed_book, seed_member, test_db};
    use chrono::Utc;
    use circ_core::{BorrowStatus, NotificationCategory};
    use circ_db::repository::generate_id;

    fn scan(db: &Database, sink: Arc<dyn NotificationSink>) -> DueDateScan {
        DueDateScan::new(
            db.clone(),
            StaticSettings::shared_default(),
            Arc::new(DbMemberDirectory::new(db.clone())),
            sink,
        )
    }

    async fn seed_active(db: &Database, member_id: &str, due: NaiveDate) -> String {
        let now = Utc::now();
        let record = BorrowRecord {
            id: generate_id(),
            member_id: member_id.to_string(),
            book_id: "b-1".to_string(),
            issue_date: due - Duration::days(14),
            due_date: due,
            return_date: None,
            status: BorrowStatus::Approved,
            created_at: now,
            updated_at: now,
        };
        db.borrows().insert(db.pool(), &record).await.unwrap();
        record.id
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_scan_issues_due_soon_and_overdue() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_member(&db, "m-2", true).await;
        seed_book(&db, "b-1", 5, 2).await;

        let today = date(2026, 2, 10);
        // Due in 2 days (inside the default 2-day window)
        let soon = seed_active(&db, "m-1", today + Duration::days(2)).await;
        // Due 3 days ago (past the default 1-day overdue threshold)
        let late = seed_active(&db, "m-2", today - Duration::days(3)).await;
        // Due in 10 days: outside every window
        seed_active(&db, "m-1", today + Duration::days(10)).await;

        let (sink, delivered) = recording_sink(false);
        let report = scan(&db, sink).run(today).await.unwrap();

        assert_eq!(report.due_soon, 1);
        assert_eq!(report.overdue, 1);
        assert!(report.failures.is_empty());
        assert_eq!(delivered.lock().unwrap().len(), 2);

        let soon_notices = db.notifications().by_member("m-1").await.unwrap();
        assert_eq!(soon_notices.len(), 1);
        assert_eq!(soon_notices[0].category, NotificationCategory::DueSoon);
        assert_eq!(soon_notices[0].related_entity_id.as_deref(), Some(soon.as_str()));

        let late_notices = db.notifications().by_member("m-2").await.unwrap();
        assert_eq!(late_notices[0].category, NotificationCategory::Overdue);
        assert_eq!(late_notices[0].related_entity_id.as_deref(), Some(late.as_str()));
    }

    #[tokio::test]
    async fn test_scan_is_idempotent_per_record() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 1, 0).await;

        let today = date(2026, 2, 10);
        seed_active(&db, "m-1", today - Duration::days(2)).await;

        let (sink, delivered) = recording_sink(false);
        let sweeper = scan(&db, sink);

        let first = sweeper.run(today).await.unwrap();
        assert_eq!(first.overdue, 1);

        // The next day's run finds the notice already issued
        let second = sweeper.run(today + Duration::days(1)).await.unwrap();
        assert_eq!(second.overdue, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_sweep() {
        let db = test_db().await;
        // m-ghost never gets inserted
        seed_member(&db, "m-ok", true).await;
        seed_book(&db, "b-1", 5, 3).await;

        let today = date(2026, 2, 10);
        seed_active(&db, "m-ghost", today - Duration::days(5)).await;
        seed_active(&db, "m-ok", today - Duration::days(5)).await;

        let (sink, delivered) = recording_sink(false);
        let report = scan(&db, sink).run(today).await.unwrap();

        // The healthy member still got their notice
        assert_eq!(report.overdue, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("m-ghost"));
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failures_are_recorded_not_fatal() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 1, 0).await;

        let today = date(2026, 2, 10);
        seed_active(&db, "m-1", today - Duration::days(2)).await;

        let (sink, _) = recording_sink(true);
        let report = scan(&db, sink).run(today).await.unwrap();

        assert_eq!(report.overdue, 1);
        assert_eq!(report.failures.len(), 1);

        // The failed attempt is retried next run (failed rows don't block)
        let failed = db
            .notifications()
            .by_status(NotificationStatus::Failed)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
    }
}
