//! # Reservation Workflow
//!
//! The reservation state machine.
//!
//! ## Lifecycle
//! ```text
//! create ──► PENDING ── approve ──► APPROVED ── fulfill ──► FULFILLED
//!               │                      │
//!               │                      │ notify: availability check,
//!               │                      │ stamps notified/expiry dates,
//!               │                      │ status stays APPROVED
//!               │                      │
//!               └──────── cancel ──────┴──────► CANCELLED
//!                     (any non-terminal state)
//! ```
//!
//! `notify` consults the inventory ledger first: a member is only told to
//! come in while a copy is actually on the shelf. The pickup window is
//! `reservation_expiry_days` from the lending policy, never a constant.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use circ_core::validation::validate_id;
use circ_core::{LendingError, LendingResult, Reservation, ReservationStatus};
use circ_db::repository::generate_id;
use circ_db::Database;

use crate::inventory::InventoryLedger;
use crate::members::MemberDirectory;
use crate::notify::{NotificationEvent, NotificationSink, Outbox};
use crate::settings::SettingsProvider;

/// State machine for reservations.
#[derive(Clone)]
pub struct ReservationWorkflow {
    db: Database,
    ledger: InventoryLedger,
    settings: Arc<dyn SettingsProvider>,
    directory: Arc<dyn MemberDirectory>,
    outbox: Outbox,
}

impl ReservationWorkflow {
    pub fn new(
        db: Database,
        settings: Arc<dyn SettingsProvider>,
        directory: Arc<dyn MemberDirectory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        ReservationWorkflow {
            ledger: InventoryLedger::new(db.clone()),
            outbox: Outbox::new(db.clone(), sink),
            db,
            settings,
            directory,
        }
    }

    /// Gets a reservation.
    pub async fn get(&self, id: &str) -> LendingResult<Reservation> {
        self.db
            .reservations()
            .get(id)
            .await?
            .ok_or_else(|| LendingError::not_found("Reservation", id))
    }

    /// Creates a PENDING reservation.
    pub async fn create(&self, member_id: &str, book_id: &str) -> LendingResult<Reservation> {
        validate_id("member_id", member_id)?;
        validate_id("book_id", book_id)?;

        if !self.db.books().exists(self.db.pool(), book_id).await? {
            return Err(LendingError::not_found("Book", book_id));
        }

        let reservation = Reservation {
            id: generate_id(),
            member_id: member_id.to_string(),
            book_id: book_id.to_string(),
            status: ReservationStatus::Pending,
            reservation_date: Utc::now().date_naive(),
            notified_date: None,
            expiry_date: None,
        };

        self.db.reservations().insert(&reservation).await?;

        info!(reservation_id = %reservation.id, member_id = %member_id, book_id = %book_id,
              "reservation created");
        Ok(reservation)
    }

    /// Approves a PENDING reservation.
    pub async fn approve(&self, id: &str) -> LendingResult<Reservation> {
        validate_id("reservation_id", id)?;

        let rows = self
            .db
            .reservations()
            .transition(
                self.db.pool(),
                id,
                ReservationStatus::Pending,
                ReservationStatus::Approved,
            )
            .await?;
        if rows == 0 {
            return Err(self.transition_error(id, "pending").await?);
        }

        info!(reservation_id = %id, "reservation approved");
        self.get(id).await
    }

    /// Tells the member their book is ready.
    ///
    /// Requires APPROVED; fails with `CapacityExceeded` while no copy is
    /// on the shelf. On success the pickup deadline is
    /// `today + reservation_expiry_days` from the lending policy.
    pub async fn notify(&self, id: &str) -> LendingResult<Reservation> {
        validate_id("reservation_id", id)?;

        let reservation = self.get(id).await?;
        if reservation.status != ReservationStatus::Approved {
            return Err(LendingError::invalid_state(
                "approved",
                reservation.status.to_string(),
            ));
        }

        // The shelf check; zero copies means nothing to pick up
        let available = self.ledger.available(&reservation.book_id).await?;
        if available == 0 {
            return Err(LendingError::CapacityExceeded {
                book_id: reservation.book_id.clone(),
            });
        }

        let policy = self.settings.policy().await?;
        let today = Utc::now().date_naive();
        let expiry = today + Duration::days(policy.reservation_expiry_days);

        let rows = self
            .db
            .reservations()
            .mark_notified(id, today, expiry)
            .await?;
        if rows == 0 {
            // Lost a cancel/fulfill race since the read above
            return Err(self.transition_error(id, "approved").await?);
        }

        if let Some(member) = self.directory.find(&reservation.member_id).await? {
            // Fire-and-forget; a delivery failure only marks the outbox row
            self.outbox
                .dispatch(NotificationEvent::reservation_ready(member, id, expiry))
                .await?;
        }

        info!(reservation_id = %id, %expiry, "member notified, pickup window open");
        self.get(id).await
    }

    /// Hands the book over: APPROVED → FULFILLED.
    pub async fn fulfill(&self, id: &str) -> LendingResult<Reservation> {
        validate_id("reservation_id", id)?;

        let rows = self
            .db
            .reservations()
            .transition(
                self.db.pool(),
                id,
                ReservationStatus::Approved,
                ReservationStatus::Fulfilled,
            )
            .await?;
        if rows == 0 {
            return Err(self.transition_error(id, "approved").await?);
        }

        info!(reservation_id = %id, "reservation fulfilled");
        self.get(id).await
    }

    /// Cancels from any non-terminal state.
    pub async fn cancel(&self, id: &str) -> LendingResult<Reservation> {
        validate_id("reservation_id", id)?;

        let rows = self.db.reservations().cancel(id).await?;
        if rows == 0 {
            return Err(self.transition_error(id, "pending or approved").await?);
        }

        info!(reservation_id = %id, "reservation cancelled");
        self.get(id).await
    }

    /// APPROVED reservations whose pickup window closed before `as_of`.
    pub async fn list_expired(&self, as_of: NaiveDate) -> LendingResult<Vec<Reservation>> {
        Ok(self.db.reservations().expired(as_of).await?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A member's reservations, newest first.
    pub async fn member_reservations(&self, member_id: &str) -> LendingResult<Vec<Reservation>> {
        validate_id("member_id", member_id)?;
        Ok(self.db.reservations().by_member(member_id).await?)
    }

    /// The pickup queue for a book, oldest first.
    pub async fn book_reservations(&self, book_id: &str) -> LendingResult<Vec<Reservation>> {
        validate_id("book_id", book_id)?;
        Ok(self.db.reservations().by_book(book_id).await?)
    }

    /// Reservations in a given status.
    pub async fn by_status(&self, status: ReservationStatus) -> LendingResult<Vec<Reservation>> {
        Ok(self.db.reservations().by_status(status).await?)
    }

    /// Builds the NotFound / InvalidState error after a refused guarded
    /// update.
    async fn transition_error(
        &self,
        id: &str,
        expected: &'static str,
    ) -> LendingResult<LendingError> {
        debug!(reservation_id = %id, expected, "reservation transition refused");
        Ok(match self.db.reservations().get(id).await? {
            None => LendingError::not_found("Reservation", id),
            Some(reservation) => {
                LendingError::invalid_state(expected, reservation.status.to_string())
            }
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::borrow::BorrowWorkflow;
    use crate::members::DbMemberDirectory;
    use crate::settings::StaticSettings;
    use crate::testutil::{recording_sink, seed_book, seed_member, test_db};
    use circ_core::NotificationCategory;

    fn workflow(db: &Database) -> ReservationWorkflow {
        let (sink, _) = recording_sink(false);
        ReservationWorkflow::new(
            db.clone(),
            StaticSettings::shared_default(),
            Arc::new(DbMemberDirectory::new(db.clone())),
            sink,
        )
    }

    #[tokio::test]
    async fn test_lifecycle_create_approve_fulfill() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 1, 1).await;
        let wf = workflow(&db);

        let reservation = wf.create("m-1", "b-1").await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);

        let approved = wf.approve(&reservation.id).await.unwrap();
        assert_eq!(approved.status, ReservationStatus::Approved);

        let fulfilled = wf.fulfill(&reservation.id).await.unwrap();
        assert_eq!(fulfilled.status, ReservationStatus::Fulfilled);

        // Terminal: cancel is an illegal transition now
        let err = wf.cancel(&reservation.id).await.unwrap_err();
        assert!(matches!(err, LendingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_approve_requires_pending() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 1, 1).await;
        let wf = workflow(&db);

        let reservation = wf.create("m-1", "b-1").await.unwrap();
        wf.cancel(&reservation.id).await.unwrap();

        assert!(matches!(
            wf.approve(&reservation.id).await.unwrap_err(),
            LendingError::InvalidState { expected: "pending", .. }
        ));
        assert!(matches!(
            wf.approve("res-missing").await.unwrap_err(),
            LendingError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_notify_blocked_until_copy_returns() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_member(&db, "m-2", true).await;
        seed_book(&db, "b-1", 1, 1).await;

        let (sink, _) = recording_sink(false);
        let settings = StaticSettings::shared_default();
        let directory: Arc<dyn MemberDirectory> = Arc::new(DbMemberDirectory::new(db.clone()));
        let borrows = BorrowWorkflow::new(
            db.clone(),
            settings.clone(),
            directory.clone(),
            sink.clone(),
        );
        let reservations =
            ReservationWorkflow::new(db.clone(), settings, directory, sink);

        // The only copy goes out to m-2
        let borrowed = borrows.self_service_borrow("m-2", "b-1").await.unwrap();

        let reservation = reservations.create("m-1", "b-1").await.unwrap();
        reservations.approve(&reservation.id).await.unwrap();

        // Zero copies on the shelf: notify refused
        let err = reservations.notify(&reservation.id).await.unwrap_err();
        assert!(matches!(err, LendingError::CapacityExceeded { .. }));

        // The return frees a copy; notify now succeeds
        borrows.return_book(&borrowed.id).await.unwrap();
        let notified = reservations.notify(&reservation.id).await.unwrap();

        let today = Utc::now().date_naive();
        assert_eq!(notified.notified_date, Some(today));
        assert_eq!(notified.expiry_date, Some(today + Duration::days(3)));

        // The pickup notice landed in the outbox
        let notices = db.notifications().by_member("m-1").await.unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].category, NotificationCategory::ReservationReady);
    }

    #[tokio::test]
    async fn test_expired_listing() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 1, 1).await;
        let wf = workflow(&db);

        let reservation = wf.create("m-1", "b-1").await.unwrap();
        wf.approve(&reservation.id).await.unwrap();
        wf.notify(&reservation.id).await.unwrap();

        let today = Utc::now().date_naive();
        // Window still open today and on the deadline itself
        assert!(wf.list_expired(today).await.unwrap().is_empty());
        assert!(wf
            .list_expired(today + Duration::days(3))
            .await
            .unwrap()
            .is_empty());

        // Closed the day after the deadline
        let expired = wf.list_expired(today + Duration::days(4)).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, reservation.id);
    }

    #[tokio::test]
    async fn test_cancel_from_pending_and_approved() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 1, 1).await;
        let wf = workflow(&db);

        let pending = wf.create("m-1", "b-1").await.unwrap();
        assert_eq!(
            wf.cancel(&pending.id).await.unwrap().status,
            ReservationStatus::Cancelled
        );

        let approved = wf.create("m-1", "b-1").await.unwrap();
        wf.approve(&approved.id).await.unwrap();
        assert_eq!(
            wf.cancel(&approved.id).await.unwrap().status,
            ReservationStatus::Cancelled
        );
    }
}
