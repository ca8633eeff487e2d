//! # Fine Engine
//!
//! Computes overdue fines from returned borrow records, tracks partial
//! payments on an append-only ledger, and supports waivers.
//!
//! ## Settlement Rules
//! - a fine accepts payments only while UNPAID or PARTIALLY_PAID
//! - a payment may never push `amount_paid` past `amount`
//! - waiving is refused once a fine is settled (PAID or WAIVED)
//! - at most one system-generated fine exists per borrow record

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use circ_core::validation::{validate_id, validate_positive_amount, validate_reason};
use circ_core::{
    Fine, FineStatus, LendingError, LendingResult, Money, Payment, PaymentMethod,
};
use circ_db::repository::generate_id;
use circ_db::{Database, FineSummary};

use crate::members::MemberDirectory;
use crate::notify::{NotificationEvent, NotificationSink, Outbox};
use crate::settings::SettingsProvider;

/// Fines, payments, and waivers.
#[derive(Clone)]
pub struct FineEngine {
    db: Database,
    settings: Arc<dyn SettingsProvider>,
    directory: Arc<dyn MemberDirectory>,
    outbox: Outbox,
}

impl FineEngine {
    pub fn new(
        db: Database,
        settings: Arc<dyn SettingsProvider>,
        directory: Arc<dyn MemberDirectory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        FineEngine {
            outbox: Outbox::new(db.clone(), sink),
            db,
            settings,
            directory,
        }
    }

    /// Gets a fine.
    pub async fn get(&self, fine_id: &str) -> LendingResult<Fine> {
        self.db
            .fines()
            .get(fine_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Fine", fine_id))
    }

    /// Computes and creates the overdue fine for a returned borrow record.
    ///
    /// Requires the record to have a return date later than its due date;
    /// the amount is `days_overdue × fine_per_day` from the lending policy.
    /// Fails with `DuplicateFine` when the record is already fined.
    pub async fn calculate_for_return(&self, borrow_record_id: &str) -> LendingResult<Fine> {
        validate_id("borrow_record_id", borrow_record_id)?;

        let record = self
            .db
            .borrows()
            .get(borrow_record_id)
            .await?
            .ok_or_else(|| LendingError::not_found("BorrowRecord", borrow_record_id))?;

        let return_date = record.return_date.ok_or_else(|| {
            LendingError::invalid_state("returned", record.status.to_string())
        })?;

        let days_overdue = (return_date - record.due_date).num_days();
        if days_overdue <= 0 {
            return Err(LendingError::invalid_state(
                "overdue return",
                format!("returned on time ({return_date})"),
            ));
        }

        let policy = self.settings.policy().await?;
        let member = self.directory.find(&record.member_id).await?;
        let today = Utc::now().date_naive();

        let fine = Fine {
            id: generate_id(),
            member_id: record.member_id.clone(),
            borrow_record_id: Some(borrow_record_id.to_string()),
            amount_cents: policy.fine_per_day.multiply_days(days_overdue).cents(),
            amount_paid_cents: 0,
            status: FineStatus::Unpaid,
            reason: format!("Overdue return: {days_overdue} days late"),
            issue_date: today,
            settled_date: None,
        };

        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;

        if self
            .db
            .fines()
            .exists_for_record(&mut *tx, borrow_record_id)
            .await?
        {
            return Err(LendingError::DuplicateFine {
                borrow_record_id: borrow_record_id.to_string(),
            });
        }

        self.db.fines().insert(&mut *tx, &fine).await?;

        let pending_notice = match member {
            Some(member) => {
                let event = NotificationEvent::fine_issued(member, &fine);
                let notification = self.outbox.record(&mut *tx, &event).await?;
                Some((notification, event))
            }
            None => None,
        };

        tx.commit().await.map_err(circ_db::DbError::from)?;

        if let Some((notification, event)) = pending_notice {
            self.outbox.deliver(notification, &event).await?;
        }

        info!(fine_id = %fine.id, borrow_record_id = %borrow_record_id,
              amount = fine.amount_cents, days_overdue, "overdue fine created");
        Ok(fine)
    }

    /// Creates a manual fine (damaged book, lost card, ...).
    pub async fn create_manual(
        &self,
        member_id: &str,
        amount: Money,
        reason: &str,
    ) -> LendingResult<Fine> {
        validate_id("member_id", member_id)?;
        validate_positive_amount("amount", amount)?;
        validate_reason("reason", reason)?;

        let member = self
            .directory
            .find(member_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Member", member_id))?;

        let fine = Fine {
            id: generate_id(),
            member_id: member_id.to_string(),
            borrow_record_id: None,
            amount_cents: amount.cents(),
            amount_paid_cents: 0,
            status: FineStatus::Unpaid,
            reason: reason.trim().to_string(),
            issue_date: Utc::now().date_naive(),
            settled_date: None,
        };

        self.db.fines().insert(self.db.pool(), &fine).await?;

        // Fire-and-forget notice; failure only marks the outbox row
        self.outbox
            .dispatch(NotificationEvent::fine_issued(member, &fine))
            .await?;

        info!(fine_id = %fine.id, member_id = %member_id, amount = fine.amount_cents,
              "manual fine created");
        Ok(fine)
    }

    /// Records a payment towards a fine.
    ///
    /// Appends a payment ledger row and moves the fine to PAID when the
    /// balance is covered, PARTIALLY_PAID otherwise.
    pub async fn record_payment(
        &self,
        fine_id: &str,
        amount: Money,
        method: PaymentMethod,
        notes: &str,
    ) -> LendingResult<Payment> {
        validate_id("fine_id", fine_id)?;
        validate_positive_amount("amount", amount)?;

        let today = Utc::now().date_naive();
        let fines = self.db.fines();

        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;

        let fine = fines
            .get_in(&mut *tx, fine_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Fine", fine_id))?;

        if fine.status.is_settled() {
            return Err(LendingError::AlreadySettled {
                fine_id: fine_id.to_string(),
                status: fine.status.to_string(),
            });
        }

        let new_paid = fine.amount_paid() + amount;
        if new_paid > fine.amount() {
            return Err(LendingError::PaymentExceedsBalance {
                fine_id: fine_id.to_string(),
                balance_cents: fine.amount_due().cents(),
                attempted_cents: amount.cents(),
            });
        }

        let payment = Payment {
            id: generate_id(),
            fine_id: fine_id.to_string(),
            member_id: fine.member_id.clone(),
            amount_cents: amount.cents(),
            method,
            notes: if notes.trim().is_empty() {
                None
            } else {
                Some(notes.trim().to_string())
            },
            paid_date: today,
            created_at: Utc::now(),
        };
        fines.add_payment(&mut *tx, &payment).await?;

        let fully_paid = new_paid == fine.amount();
        let (new_status, settled_date) = if fully_paid {
            (FineStatus::Paid, Some(today))
        } else {
            (FineStatus::PartiallyPaid, None)
        };

        let rows = fines
            .apply_payment(&mut *tx, fine_id, new_paid.cents(), new_status, settled_date)
            .await?;
        if rows == 0 {
            // Lost a settle race; roll the payment back with the tx
            return Err(LendingError::AlreadySettled {
                fine_id: fine_id.to_string(),
                status: fine.status.to_string(),
            });
        }

        tx.commit().await.map_err(circ_db::DbError::from)?;

        info!(fine_id = %fine_id, amount = amount.cents(), status = %new_status,
              "payment recorded");
        Ok(payment)
    }

    /// Settles the full remaining balance with one synthesized CASH
    /// payment (the desk workflow for "they just paid it all").
    pub async fn mark_fully_paid(&self, fine_id: &str) -> LendingResult<Fine> {
        validate_id("fine_id", fine_id)?;

        let today = Utc::now().date_naive();
        let fines = self.db.fines();

        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;

        let fine = fines
            .get_in(&mut *tx, fine_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Fine", fine_id))?;

        if fine.status.is_settled() {
            return Err(LendingError::AlreadySettled {
                fine_id: fine_id.to_string(),
                status: fine.status.to_string(),
            });
        }

        let remaining = fine.amount_due();
        if remaining.is_positive() {
            let payment = Payment {
                id: generate_id(),
                fine_id: fine_id.to_string(),
                member_id: fine.member_id.clone(),
                amount_cents: remaining.cents(),
                method: PaymentMethod::Cash,
                notes: Some("Marked fully paid at the desk".to_string()),
                paid_date: today,
                created_at: Utc::now(),
            };
            fines.add_payment(&mut *tx, &payment).await?;
        }

        let rows = fines
            .apply_payment(
                &mut *tx,
                fine_id,
                fine.amount_cents,
                FineStatus::Paid,
                Some(today),
            )
            .await?;
        if rows == 0 {
            return Err(LendingError::AlreadySettled {
                fine_id: fine_id.to_string(),
                status: fine.status.to_string(),
            });
        }

        tx.commit().await.map_err(circ_db::DbError::from)?;

        info!(fine_id = %fine_id, settled = remaining.cents(), "fine marked fully paid");
        self.get(fine_id).await
    }

    /// Waives an outstanding fine, keeping the waiver reason on the audit
    /// trail. A settled fine (PAID or WAIVED) is refused.
    pub async fn waive(&self, fine_id: &str, reason: &str) -> LendingResult<Fine> {
        validate_id("fine_id", fine_id)?;
        validate_reason("reason", reason)?;

        let today = Utc::now().date_naive();
        let suffix = format!(" [WAIVED: {}]", reason.trim());

        let rows = self
            .db
            .fines()
            .waive(self.db.pool(), fine_id, &suffix, today)
            .await?;
        if rows == 0 {
            return match self.db.fines().get(fine_id).await? {
                None => Err(LendingError::not_found("Fine", fine_id)),
                Some(fine) => Err(LendingError::AlreadySettled {
                    fine_id: fine_id.to_string(),
                    status: fine.status.to_string(),
                }),
            };
        }

        info!(fine_id = %fine_id, "fine waived");
        self.get(fine_id).await
    }

    /// Sum of `amount_due` over the member's outstanding fines. What the
    /// lending gate consults.
    pub async fn member_outstanding(&self, member_id: &str) -> LendingResult<Money> {
        validate_id("member_id", member_id)?;
        let total = self
            .db
            .fines()
            .outstanding_total(self.db.pool(), member_id)
            .await?;

        debug!(member_id = %member_id, outstanding = total, "member outstanding computed");
        Ok(Money::from_cents(total))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A member's fines, newest first.
    pub async fn member_fines(&self, member_id: &str) -> LendingResult<Vec<Fine>> {
        validate_id("member_id", member_id)?;
        Ok(self.db.fines().by_member(member_id).await?)
    }

    /// Fines in a given status.
    pub async fn fines_by_status(&self, status: FineStatus) -> LendingResult<Vec<Fine>> {
        Ok(self.db.fines().by_status(status).await?)
    }

    /// Payments towards one fine, oldest first.
    pub async fn fine_payments(&self, fine_id: &str) -> LendingResult<Vec<Payment>> {
        validate_id("fine_id", fine_id)?;
        Ok(self.db.fines().payments_for_fine(fine_id).await?)
    }

    /// A member's payments, newest first.
    pub async fn member_payments(&self, member_id: &str) -> LendingResult<Vec<Payment>> {
        validate_id("member_id", member_id)?;
        Ok(self.db.fines().payments_by_member(member_id).await?)
    }

    /// The whole payment ledger.
    pub async fn all_payments(&self) -> LendingResult<Vec<Payment>> {
        Ok(self.db.fines().all_payments().await?)
    }

    /// Aggregate totals and per-status counts over all fines.
    pub async fn summary(&self) -> LendingResult<FineSummary> {
        Ok(self.db.fines().summary().await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
