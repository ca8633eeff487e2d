//! # Fine Repository
//!
//! Database operations for fines and their append-only payment ledger.
//!
//! ## Fine Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Fine Lifecycle                                │
//! │                                                                     │
//! │  UNPAID ── record_payment (partial) ──► PARTIALLY_PAID              │
//! │    │              │                          │                      │
//! │    │              └── (covers balance) ──────┴──► PAID (settled)    │
//! │    │                                                                │
//! │    └── waive ──────────────────────────────────► WAIVED (settled)   │
//! │                                                                     │
//! │  Settled fines accept no further mutation; the settle update is     │
//! │  guarded by `status IN ('unpaid', 'partially_paid')`.               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use circ_core::{Fine, FineStatus, Payment};

const SELECT_FINE: &str = r#"
    SELECT id, member_id, borrow_record_id,
           amount_cents, amount_paid_cents,
           status, reason, issue_date, settled_date
    FROM fines
"#;

const SELECT_PAYMENT: &str = r#"
    SELECT id, fine_id, member_id, amount_cents,
           method, notes, paid_date, created_at
    FROM payments
"#;

/// Aggregate totals over all fines, for the fine report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineSummary {
    pub total_fined_cents: i64,
    pub total_paid_cents: i64,
    pub total_outstanding_cents: i64,
    pub unpaid_count: i64,
    pub partially_paid_count: i64,
    pub paid_count: i64,
    pub waived_count: i64,
    pub total_count: i64,
}

/// Repository for fine and payment database operations.
#[derive(Debug, Clone)]
pub struct FineRepository {
    pool: SqlitePool,
}

impl FineRepository {
    /// Creates a new FineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FineRepository { pool }
    }

    /// Gets a fine by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Fine>> {
        self.get_in(&self.pool, id).await
    }

    /// Gets a fine by its ID on the given executor.
    pub async fn get_in(&self, ex: impl SqliteExecutor<'_>, id: &str) -> DbResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(&format!("{SELECT_FINE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(ex)
            .await?;

        Ok(fine)
    }

    /// Inserts a new fine.
    pub async fn insert(&self, ex: impl SqliteExecutor<'_>, fine: &Fine) -> DbResult<()> {
        debug!(id = %fine.id, member_id = %fine.member_id, amount = fine.amount_cents,
               "inserting fine");

        sqlx::query(
            r#"
            INSERT INTO fines (
                id, member_id, borrow_record_id,
                amount_cents, amount_paid_cents,
                status, reason, issue_date, settled_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&fine.id)
        .bind(&fine.member_id)
        .bind(&fine.borrow_record_id)
        .bind(fine.amount_cents)
        .bind(fine.amount_paid_cents)
        .bind(fine.status)
        .bind(&fine.reason)
        .bind(fine.issue_date)
        .bind(fine.settled_date)
        .execute(ex)
        .await?;

        Ok(())
    }

    /// Checks whether a system-generated fine already exists for the
    /// borrow record.
    pub async fn exists_for_record(
        &self,
        ex: impl SqliteExecutor<'_>,
        borrow_record_id: &str,
    ) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM fines WHERE borrow_record_id = ?1 LIMIT 1")
                .bind(borrow_record_id)
                .fetch_optional(ex)
                .await?;

        Ok(found.is_some())
    }

    /// Applies a paid-amount/status update to a fine that is still
    /// outstanding.
    ///
    /// The guard `status IN ('unpaid', 'partially_paid')` gives per-record
    /// atomicity: a concurrent settle makes this a no-op instead of a
    /// double-settle.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the fine is missing or already settled.
    pub async fn apply_payment(
        &self,
        ex: impl SqliteExecutor<'_>,
        fine_id: &str,
        new_paid_cents: i64,
        new_status: FineStatus,
        settled_date: Option<NaiveDate>,
    ) -> DbResult<u64> {
        debug!(id = %fine_id, new_paid_cents, status = %new_status, "applying payment to fine");

        let result = sqlx::query(
            r#"
            UPDATE fines
            SET amount_paid_cents = ?2, status = ?3, settled_date = ?4
            WHERE id = ?1 AND status IN ('unpaid', 'partially_paid')
            "#,
        )
        .bind(fine_id)
        .bind(new_paid_cents)
        .bind(new_status)
        .bind(settled_date)
        .execute(ex)
        .await?;

        Ok(result.rows_affected())
    }

    /// Waives an outstanding fine, appending the waiver note to its reason.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the fine is missing or already settled.
    pub async fn waive(
        &self,
        ex: impl SqliteExecutor<'_>,
        fine_id: &str,
        reason_suffix: &str,
        settled_date: NaiveDate,
    ) -> DbResult<u64> {
        debug!(id = %fine_id, "waiving fine");

        let result = sqlx::query(
            r#"
            UPDATE fines
            SET status = 'waived', reason = reason || ?2, settled_date = ?3
            WHERE id = ?1 AND status IN ('unpaid', 'partially_paid')
            "#,
        )
        .bind(fine_id)
        .bind(reason_suffix)
        .bind(settled_date)
        .execute(ex)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lists a member's fines, newest first.
    pub async fn by_member(&self, member_id: &str) -> DbResult<Vec<Fine>> {
        let fines = sqlx::query_as::<_, Fine>(&format!(
            "{SELECT_FINE} WHERE member_id = ?1 ORDER BY issue_date DESC, id"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(fines)
    }

    /// Lists fines in a given status.
    pub async fn by_status(&self, status: FineStatus) -> DbResult<Vec<Fine>> {
        let fines = sqlx::query_as::<_, Fine>(&format!(
            "{SELECT_FINE} WHERE status = ?1 ORDER BY issue_date DESC, id"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(fines)
    }

    /// Lists all fines.
    pub async fn all(&self) -> DbResult<Vec<Fine>> {
        let fines =
            sqlx::query_as::<_, Fine>(&format!("{SELECT_FINE} ORDER BY issue_date DESC, id"))
                .fetch_all(&self.pool)
                .await?;

        Ok(fines)
    }

    /// Sum of `amount - amount_paid` over a member's outstanding fines.
    pub async fn outstanding_total(
        &self,
        ex: impl SqliteExecutor<'_>,
        member_id: &str,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_cents - amount_paid_cents)
            FROM fines
            WHERE member_id = ?1 AND status IN ('unpaid', 'partially_paid')
            "#,
        )
        .bind(member_id)
        .fetch_one(ex)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Aggregate totals and per-status counts over all fines.
    pub async fn summary(&self) -> DbResult<FineSummary> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount_cents), 0),
                COALESCE(SUM(amount_paid_cents), 0),
                COALESCE(SUM(CASE WHEN status IN ('unpaid', 'partially_paid')
                                  THEN amount_cents - amount_paid_cents ELSE 0 END), 0),
                COALESCE(SUM(status = 'unpaid'), 0),
                COALESCE(SUM(status = 'partially_paid'), 0),
                COALESCE(SUM(status = 'paid'), 0),
                COALESCE(SUM(status = 'waived'), 0),
                COUNT(*)
            FROM fines
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(FineSummary {
            total_fined_cents: row.0,
            total_paid_cents: row.1,
            total_outstanding_cents: row.2,
            unpaid_count: row.3,
            partially_paid_count: row.4,
            paid_count: row.5,
            waived_count: row.6,
            total_count: row.7,
        })
    }

    // =========================================================================
    // Payments (append-only)
    // =========================================================================

    /// Appends a payment row. Payments are never updated or deleted.
    pub async fn add_payment(
        &self,
        ex: impl SqliteExecutor<'_>,
        payment: &Payment,
    ) -> DbResult<()> {
        debug!(fine_id = %payment.fine_id, amount = payment.amount_cents, "recording payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, fine_id, member_id, amount_cents,
                method, notes, paid_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.fine_id)
        .bind(&payment.member_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(&payment.notes)
        .bind(payment.paid_date)
        .bind(payment.created_at)
        .execute(ex)
        .await?;

        Ok(())
    }

    /// Gets all payments for a fine, oldest first.
    pub async fn payments_for_fine(&self, fine_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "{SELECT_PAYMENT} WHERE fine_id = ?1 ORDER BY created_at"
        ))
        .bind(fine_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Gets all payments made by a member, newest first.
    pub async fn payments_by_member(&self, member_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "{SELECT_PAYMENT} WHERE member_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Gets the whole payment ledger, oldest first.
    pub async fn all_payments(&self) -> DbResult<Vec<Payment>> {
        let payments =
            sqlx::query_as::<_, Payment>(&format!("{SELECT_PAYMENT} ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await?;

        Ok(payments)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use chrono::{NaiveDate, Utc};
    use circ_core::PaymentMethod;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fine(member_id: &str, amount: i64) -> Fine {
        Fine {
            id: generate_id(),
            member_id: member_id.to_string(),
            borrow_record_id: None,
            amount_cents: amount,
            amount_paid_cents: 0,
            status: FineStatus::Unpaid,
            reason: "test fine".to_string(),
            issue_date: date(2026, 1, 10),
            settled_date: None,
        }
    }

    #[tokio::test]
    async fn test_apply_payment_guard_blocks_settled() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fines();

        let f = fine("m-1", 500);
        repo.insert(db.pool(), &f).await.unwrap();

        let n = repo
            .apply_payment(db.pool(), &f.id, 500, FineStatus::Paid, Some(date(2026, 1, 11)))
            .await
            .unwrap();
        assert_eq!(n, 1);

        // Already paid: guard refuses
        let n = repo
            .apply_payment(db.pool(), &f.id, 500, FineStatus::Paid, Some(date(2026, 1, 12)))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_waive_appends_reason() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fines();

        let f = fine("m-1", 300);
        repo.insert(db.pool(), &f).await.unwrap();

        let n = repo
            .waive(db.pool(), &f.id, " [WAIVED: damaged in flood]", date(2026, 1, 12))
            .await
            .unwrap();
        assert_eq!(n, 1);

        let found = repo.get(&f.id).await.unwrap().unwrap();
        assert_eq!(found.status, FineStatus::Waived);
        assert_eq!(found.reason, "test fine [WAIVED: damaged in flood]");
        assert_eq!(found.settled_date, Some(date(2026, 1, 12)));
    }

    #[tokio::test]
    async fn test_outstanding_total() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fines();

        let f1 = fine("m-1", 500);
        repo.insert(db.pool(), &f1).await.unwrap();

        let mut f2 = fine("m-1", 400);
        f2.amount_paid_cents = 100;
        f2.status = FineStatus::PartiallyPaid;
        repo.insert(db.pool(), &f2).await.unwrap();

        // Settled fines don't count
        let mut f3 = fine("m-1", 900);
        f3.amount_paid_cents = 900;
        f3.status = FineStatus::Paid;
        repo.insert(db.pool(), &f3).await.unwrap();

        // Other members don't count
        repo.insert(db.pool(), &fine("m-2", 1000)).await.unwrap();

        let total = repo.outstanding_total(db.pool(), "m-1").await.unwrap();
        assert_eq!(total, 500 + 300);
    }

    #[tokio::test]
    async fn test_duplicate_system_fine_rejected_by_index() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fines();

        let mut f1 = fine("m-1", 500);
        f1.borrow_record_id = Some("rec-1".to_string());
        repo.insert(db.pool(), &f1).await.unwrap();

        assert!(repo.exists_for_record(db.pool(), "rec-1").await.unwrap());

        let mut f2 = fine("m-1", 200);
        f2.borrow_record_id = Some("rec-1".to_string());
        let err = repo.insert(db.pool(), &f2).await.unwrap_err();
        assert!(matches!(err, crate::error::DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_summary() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fines();

        repo.insert(db.pool(), &fine("m-1", 500)).await.unwrap();

        let mut partially = fine("m-2", 400);
        partially.amount_paid_cents = 150;
        partially.status = FineStatus::PartiallyPaid;
        repo.insert(db.pool(), &partially).await.unwrap();

        let mut waived = fine("m-3", 700);
        waived.status = FineStatus::Waived;
        repo.insert(db.pool(), &waived).await.unwrap();

        let summary = repo.summary().await.unwrap();
        assert_eq!(summary.total_fined_cents, 1600);
        assert_eq!(summary.total_paid_cents, 150);
        assert_eq!(summary.total_outstanding_cents, 500 + 250);
        assert_eq!(summary.unpaid_count, 1);
        assert_eq!(summary.partially_paid_count, 1);
        assert_eq!(summary.paid_count, 0);
        assert_eq!(summary.waived_count, 1);
        assert_eq!(summary.total_count, 3);
    }

    #[tokio::test]
    async fn test_payment_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fines();

        let f = fine("m-1", 500);
        repo.insert(db.pool(), &f).await.unwrap();

        let payment = Payment {
            id: generate_id(),
            fine_id: f.id.clone(),
            member_id: "m-1".to_string(),
            amount_cents: 200,
            method: PaymentMethod::Cash,
            notes: None,
            paid_date: date(2026, 1, 11),
            created_at: Utc::now(),
        };
        repo.add_payment(db.pool(), &payment).await.unwrap();

        let for_fine = repo.payments_for_fine(&f.id).await.unwrap();
        assert_eq!(for_fine.len(), 1);
        assert_eq!(for_fine[0].amount_cents, 200);
        assert_eq!(for_fine[0].method, PaymentMethod::Cash);

        let for_member = repo.payments_by_member("m-1").await.unwrap();
        assert_eq!(for_member.len(), 1);
    }
}
