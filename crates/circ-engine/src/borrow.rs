//! # Borrow Workflow
//!
//! The borrow request state machine, from creation through return.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Borrow Lifecycle                               │
//! │                                                                     │
//! │  issue(member, book)                                                │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  PENDING ── reject ──► REJECTED (terminal, no inventory effect)     │
//! │       │                                                             │
//! │       │ approve: status flip + ledger decrement, one transaction    │
//! │       ▼                                                             │
//! │  APPROVED                                                           │
//! │       │                                                             │
//! │       │ return_book: status flip + ledger increment                 │
//! │       │              + overdue fine + fine notice, one transaction  │
//! │       ▼                                                             │
//! │  RETURNED (terminal)                                                │
//! │                                                                     │
//! │  self_service_borrow = gate check, then issue + approve through     │
//! │  the same transition and decrement path. Inventory is decremented   │
//! │  at approval on both paths.                                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use circ_core::validation::validate_id;
use circ_core::{
    BorrowRecord, BorrowStatus, Fine, FineStatus, LendingError, LendingResult,
};
use circ_db::repository::generate_id;
use circ_db::Database;

use crate::gate::LendingGate;
use crate::inventory::InventoryLedger;
use crate::members::MemberDirectory;
use crate::notify::{NotificationEvent, NotificationSink, Outbox};
use crate::settings::SettingsProvider;

/// The result of a return: the closed record, plus the overdue fine when
/// the return was late.
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub record: BorrowRecord,
    pub fine: Option<Fine>,
}

/// State machine for borrow requests.
#[derive(Clone)]
pub struct BorrowWorkflow {
    db: Database,
    ledger: InventoryLedger,
    gate: LendingGate,
    settings: Arc<dyn SettingsProvider>,
    directory: Arc<dyn MemberDirectory>,
    outbox: Outbox,
}

impl BorrowWorkflow {
    pub fn new(
        db: Database,
        settings: Arc<dyn SettingsProvider>,
        directory: Arc<dyn MemberDirectory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        BorrowWorkflow {
            ledger: InventoryLedger::new(db.clone()),
            gate: LendingGate::new(db.clone(), directory.clone()),
            outbox: Outbox::new(db.clone(), sink),
            db,
            settings,
            directory,
        }
    }

    /// Gets a borrow record.
    pub async fn get(&self, record_id: &str) -> LendingResult<BorrowRecord> {
        self.db
            .borrows()
            .get(record_id)
            .await?
            .ok_or_else(|| LendingError::not_found("BorrowRecord", record_id))
    }

    /// Creates a PENDING borrow request.
    ///
    /// Does not touch inventory; the copy is taken at approval. The due
    /// date is `today + borrow_duration_days` from the lending policy.
    pub async fn issue(&self, member_id: &str, book_id: &str) -> LendingResult<BorrowRecord> {
        validate_id("member_id", member_id)?;
        validate_id("book_id", book_id)?;

        if !self.db.books().exists(self.db.pool(), book_id).await? {
            return Err(LendingError::not_found("Book", book_id));
        }

        let policy = self.settings.policy().await?;
        let today = Utc::now().date_naive();
        let now = Utc::now();

        let record = BorrowRecord {
            id: generate_id(),
            member_id: member_id.to_string(),
            book_id: book_id.to_string(),
            issue_date: today,
            due_date: today + Duration::days(policy.borrow_duration_days),
            return_date: None,
            status: BorrowStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.db.borrows().insert(self.db.pool(), &record).await?;

        info!(record_id = %record.id, member_id = %member_id, book_id = %book_id,
              due_date = %record.due_date, "borrow request issued");
        Ok(record)
    }

    /// Approves a PENDING request, taking one copy off the shelf.
    ///
    /// The status flip and the ledger decrement run in one transaction:
    /// on `CapacityExceeded` the record stays PENDING.
    pub async fn approve(&self, record_id: &str) -> LendingResult<BorrowRecord> {
        validate_id("record_id", record_id)?;

        let borrows = self.db.borrows();
        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;

        let rows = borrows
            .transition(&mut *tx, record_id, BorrowStatus::Pending, BorrowStatus::Approved)
            .await?;
        if rows == 0 {
            return match borrows.get_in(&mut *tx, record_id).await? {
                None => Err(LendingError::not_found("BorrowRecord", record_id)),
                Some(record) => Err(LendingError::invalid_state(
                    "pending",
                    record.status.to_string(),
                )),
            };
        }

        let record = borrows
            .get_in(&mut *tx, record_id)
            .await?
            .ok_or_else(|| LendingError::not_found("BorrowRecord", record_id))?;

        // Rolls the status flip back when no copy is available
        self.ledger.decrement_tx(&mut tx, &record.book_id).await?;

        tx.commit().await.map_err(circ_db::DbError::from)?;

        info!(record_id = %record_id, book_id = %record.book_id, "borrow request approved");
        Ok(record)
    }

    /// Rejects a PENDING request. No inventory effect.
    pub async fn reject(&self, record_id: &str) -> LendingResult<BorrowRecord> {
        validate_id("record_id", record_id)?;

        let borrows = self.db.borrows();
        let rows = borrows
            .transition(
                self.db.pool(),
                record_id,
                BorrowStatus::Pending,
                BorrowStatus::Rejected,
            )
            .await?;
        if rows == 0 {
            return match borrows.get(record_id).await? {
                None => Err(LendingError::not_found("BorrowRecord", record_id)),
                Some(record) => Err(LendingError::invalid_state(
                    "pending",
                    record.status.to_string(),
                )),
            };
        }

        info!(record_id = %record_id, "borrow request rejected");
        self.get(record_id).await
    }

    /// Returns an APPROVED book.
    ///
    /// One unit of work: the status flip, the ledger increment, and (when
    /// the return is late) the overdue fine and its notification audit row
    /// all commit together or not at all. The fine notice is delivered
    /// after commit, fire-and-forget.
    pub async fn return_book(&self, record_id: &str) -> LendingResult<ReturnOutcome> {
        validate_id("record_id", record_id)?;

        // Collaborator reads happen before the transaction is opened
        let policy = self.settings.policy().await?;
        let existing = self
            .db
            .borrows()
            .get(record_id)
            .await?
            .ok_or_else(|| LendingError::not_found("BorrowRecord", record_id))?;
        let member = self.directory.find(&existing.member_id).await?;

        let today = Utc::now().date_naive();
        let borrows = self.db.borrows();
        let fines = self.db.fines();

        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;

        let rows = borrows.mark_returned(&mut *tx, record_id, today).await?;
        if rows == 0 {
            return match borrows.get_in(&mut *tx, record_id).await? {
                None => Err(LendingError::not_found("BorrowRecord", record_id)),
                Some(record) => Err(LendingError::invalid_state(
                    "approved",
                    record.status.to_string(),
                )),
            };
        }

        let record = borrows
            .get_in(&mut *tx, record_id)
            .await?
            .ok_or_else(|| LendingError::not_found("BorrowRecord", record_id))?;

        self.ledger.increment_tx(&mut tx, &record.book_id).await?;

        // Overdue return generates the fine in the same unit of work
        let days_late = record.days_overdue(today);
        let mut fine = None;
        let mut pending_notice = None;

        if days_late > 0 && !fines.exists_for_record(&mut *tx, record_id).await? {
            let new_fine = Fine {
                id: generate_id(),
                member_id: record.member_id.clone(),
                borrow_record_id: Some(record_id.to_string()),
                amount_cents: policy.fine_per_day.multiply_days(days_late).cents(),
                amount_paid_cents: 0,
                status: FineStatus::Unpaid,
                reason: format!("Overdue return: {days_late} days late"),
                issue_date: today,
                settled_date: None,
            };
            fines.insert(&mut *tx, &new_fine).await?;

            if let Some(member) = member {
                let event = NotificationEvent::fine_issued(member, &new_fine);
                let notification = self.outbox.record(&mut *tx, &event).await?;
                pending_notice = Some((notification, event));
            }

            debug!(record_id = %record_id, days_late, amount = new_fine.amount_cents,
                   "overdue fine created with return");
            fine = Some(new_fine);
        }

        tx.commit().await.map_err(circ_db::DbError::from)?;

        // Fire-and-forget: a delivery failure only marks the outbox row
        if let Some((notification, event)) = pending_notice {
            self.outbox.deliver(notification, &event).await?;
        }

        info!(record_id = %record_id, book_id = %record.book_id,
              fined = fine.is_some(), "book returned");
        Ok(ReturnOutcome { record, fine })
    }

    /// Member-initiated borrow: lending gate, then the same transition and
    /// decrement path as the admin flow, approved immediately.
    ///
    /// One decrement policy for both entry points: inventory moves at
    /// approval.
    pub async fn self_service_borrow(
        &self,
        member_id: &str,
        book_id: &str,
    ) -> LendingResult<BorrowRecord> {
        validate_id("member_id", member_id)?;
        validate_id("book_id", book_id)?;

        if !self.db.books().exists(self.db.pool(), book_id).await? {
            return Err(LendingError::not_found("Book", book_id));
        }

        // Single authority for the admission rule
        self.gate.enforce(member_id, book_id).await?;

        let policy = self.settings.policy().await?;
        let today = Utc::now().date_naive();
        let now = Utc::now();

        let record = BorrowRecord {
            id: generate_id(),
            member_id: member_id.to_string(),
            book_id: book_id.to_string(),
            issue_date: today,
            due_date: today + Duration::days(policy.borrow_duration_days),
            return_date: None,
            status: BorrowStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let borrows = self.db.borrows();
        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;

        borrows.insert(&mut *tx, &record).await?;
        borrows
            .transition(&mut *tx, &record.id, BorrowStatus::Pending, BorrowStatus::Approved)
            .await?;
        self.ledger.decrement_tx(&mut tx, book_id).await?;

        tx.commit().await.map_err(circ_db::DbError::from)?;

        info!(record_id = %record.id, member_id = %member_id, book_id = %book_id,
              "self-service borrow approved");
        self.get(&record.id).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// PENDING requests awaiting a decision.
    pub async fn pending_requests(&self) -> LendingResult<Vec<BorrowRecord>> {
        Ok(self.db.borrows().by_status(BorrowStatus::Pending).await?)
    }

    /// APPROVED records with the book still out.
    pub async fn active_borrows(&self) -> LendingResult<Vec<BorrowRecord>> {
        Ok(self.db.borrows().active().await?)
    }

    /// A member's full borrow history.
    pub async fn member_history(&self, member_id: &str) -> LendingResult<Vec<BorrowRecord>> {
        validate_id("member_id", member_id)?;
        Ok(self.db.borrows().by_member(member_id).await?)
    }

    // =========================================================================
    // Consistency repair
    // =========================================================================

    /// Records whose book reference is broken: blank book id or a book
    /// that no longer exists. A repair surface, not a workflow transition.
    pub async fn list_invalid(&self) -> LendingResult<Vec<BorrowRecord>> {
        Ok(self.db.borrows().orphaned().await?)
    }

    /// Deletes one invalid record. A record whose book exists is refused;
    /// the guard is re-checked inside the delete statement itself.
    pub async fn delete_invalid(&self, record_id: &str) -> LendingResult<()> {
        validate_id("record_id", record_id)?;

        let rows = self.db.borrows().delete_orphaned(record_id).await?;
        if rows == 0 {
            return match self.db.borrows().get(record_id).await? {
                None => Err(LendingError::not_found("BorrowRecord", record_id)),
                Some(_) => Err(LendingError::rule(
                    "cannot delete a borrow record whose book exists",
                )),
            };
        }

        info!(record_id = %record_id, "invalid borrow record deleted");
        Ok(())
    }

    /// Deletes every invalid record and returns how many went.
    pub async fn cleanup_invalid(&self) -> LendingResult<usize> {
        let invalid = self.list_invalid().await?;
        let mut deleted = 0;

        for record in &invalid {
            // The per-record guard re-checks; a book restored between the
            // listing and the delete keeps its record
            if self.db.borrows().delete_orphaned(&record.id).await? > 0 {
                deleted += 1;
            }
        }

        info!(deleted, "invalid borrow records cleaned up");
        Ok(deleted)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
