//! # Borrow Record Repository
//!
//! Database operations for borrow records.
//!
//! ## Status-Guarded Transitions
//! Every workflow transition is a conditional update
//! (`WHERE id = ? AND status = ?`), which gives per-record atomicity: two
//! concurrent approvals of the same record cannot both pass the guard.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use circ_core::{BorrowRecord, BorrowStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT id, member_id, book_id,
           issue_date, due_date, return_date,
           status, created_at, updated_at
    FROM borrow_records
"#;

/// Repository for borrow record database operations.
#[derive(Debug, Clone)]
pub struct BorrowRepository {
    pool: SqlitePool,
}

impl BorrowRepository {
    /// Creates a new BorrowRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BorrowRepository { pool }
    }

    /// Gets a borrow record by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<BorrowRecord>> {
        self.get_in(&self.pool, id).await
    }

    /// Gets a borrow record by its ID on the given executor.
    pub async fn get_in(
        &self,
        ex: impl SqliteExecutor<'_>,
        id: &str,
    ) -> DbResult<Option<BorrowRecord>> {
        let record =
            sqlx::query_as::<_, BorrowRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(ex)
                .await?;

        Ok(record)
    }

    /// Inserts a new borrow record.
    pub async fn insert(&self, ex: impl SqliteExecutor<'_>, record: &BorrowRecord) -> DbResult<()> {
        debug!(id = %record.id, member_id = %record.member_id, book_id = %record.book_id,
               "inserting borrow record");

        sqlx::query(
            r#"
            INSERT INTO borrow_records (
                id, member_id, book_id,
                issue_date, due_date, return_date,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.id)
        .bind(&record.member_id)
        .bind(&record.book_id)
        .bind(record.issue_date)
        .bind(record.due_date)
        .bind(record.return_date)
        .bind(record.status)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(ex)
        .await?;

        Ok(())
    }

    /// Moves a record from `from` to `to` if and only if it is still in
    /// `from`.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the record is missing or not in `from`.
    pub async fn transition(
        &self,
        ex: impl SqliteExecutor<'_>,
        id: &str,
        from: BorrowStatus,
        to: BorrowStatus,
    ) -> DbResult<u64> {
        debug!(id = %id, from = %from, to = %to, "borrow transition");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(ex)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks an APPROVED record as RETURNED with the given return date.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the record is missing or not APPROVED.
    pub async fn mark_returned(
        &self,
        ex: impl SqliteExecutor<'_>,
        id: &str,
        return_date: NaiveDate,
    ) -> DbResult<u64> {
        debug!(id = %id, %return_date, "marking borrow record returned");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = 'returned', return_date = ?2, updated_at = ?3
            WHERE id = ?1 AND status = 'approved'
            "#,
        )
        .bind(id)
        .bind(return_date)
        .bind(now)
        .execute(ex)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lists records in a given status, oldest first.
    pub async fn by_status(&self, status: BorrowStatus) -> DbResult<Vec<BorrowRecord>> {
        let records =
            sqlx::query_as::<_, BorrowRecord>(&format!(
                "{SELECT_COLUMNS} WHERE status = ?1 ORDER BY created_at"
            ))
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Lists a member's full borrow history, newest first.
    pub async fn by_member(&self, member_id: &str) -> DbResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            "{SELECT_COLUMNS} WHERE member_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Lists currently-out records: APPROVED with no return date.
    pub async fn active(&self) -> DbResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            "{SELECT_COLUMNS} WHERE status = 'approved' AND return_date IS NULL ORDER BY due_date"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Checks whether the member currently holds an unreturned APPROVED
    /// record for the book.
    pub async fn has_active_borrow(
        &self,
        ex: impl SqliteExecutor<'_>,
        member_id: &str,
        book_id: &str,
    ) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM borrow_records
            WHERE member_id = ?1 AND book_id = ?2
              AND status = 'approved' AND return_date IS NULL
            LIMIT 1
            "#,
        )
        .bind(member_id)
        .bind(book_id)
        .fetch_optional(ex)
        .await?;

        Ok(found.is_some())
    }

    /// Active records due between `from` and `to` inclusive (due-soon scan).
    pub async fn approved_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE status = 'approved' AND return_date IS NULL
              AND due_date >= ?1 AND due_date <= ?2
            ORDER BY due_date"#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Active records whose due date lies strictly before `as_of`
    /// (overdue scan).
    pub async fn approved_overdue(&self, as_of: NaiveDate) -> DbResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE status = 'approved' AND return_date IS NULL
              AND due_date < ?1
            ORDER BY due_date"#
        ))
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Records whose book reference is broken: blank book_id or a book
    /// that no longer exists.
    pub async fn orphaned(&self) -> DbResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            r#"{SELECT_COLUMNS} AS br
            WHERE br.book_id = ''
               OR NOT EXISTS (SELECT 1 FROM books b WHERE b.id = br.book_id)
            ORDER BY br.created_at"#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Deletes a record only while its book reference is broken.
    ///
    /// The guard re-checks inside the statement, so a record whose book
    /// exists can never be deleted through this path.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the record is missing or still valid.
    pub async fn delete_orphaned(&self, id: &str) -> DbResult<u64> {
        debug!(id = %id, "deleting orphaned borrow record");

        let result = sqlx::query(
            r#"
            DELETE FROM borrow_records
            WHERE id = ?1
              AND (book_id = ''
                   OR NOT EXISTS (SELECT 1 FROM books b WHERE b.id = borrow_records.book_id))
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use chrono::{NaiveDate, Utc};
    use circ_core::{Book, BorrowRecord, BorrowStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(book_id: &str, status: BorrowStatus) -> BorrowRecord {
        let now = Utc::now();
        BorrowRecord {
            id: generate_id(),
            member_id: "m-1".to_string(),
            book_id: book_id.to_string(),
            issue_date: date(2026, 1, 1),
            due_date: date(2026, 1, 15),
            return_date: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed_book(db: &Database, id: &str) {
        let now = Utc::now();
        db.books()
            .insert(&Book {
                id: id.to_string(),
                title: "T".to_string(),
                author: "A".to_string(),
                category: String::new(),
                isbn: None,
                total_copies: 1,
                copies_available: 1,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transition_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_book(&db, "b-1").await;
        let repo = db.borrows();

        let rec = record("b-1", BorrowStatus::Pending);
        repo.insert(db.pool(), &rec).await.unwrap();

        // pending -> approved succeeds
        let n = repo
            .transition(db.pool(), &rec.id, BorrowStatus::Pending, BorrowStatus::Approved)
            .await
            .unwrap();
        assert_eq!(n, 1);

        // a second approval finds nothing in pending
        let n = repo
            .transition(db.pool(), &rec.id, BorrowStatus::Pending, BorrowStatus::Approved)
            .await
            .unwrap();
        assert_eq!(n, 0);

        let found = repo.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(found.status, BorrowStatus::Approved);
    }

    #[tokio::test]
    async fn test_mark_returned_requires_approved() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_book(&db, "b-1").await;
        let repo = db.borrows();

        let rec = record("b-1", BorrowStatus::Pending);
        repo.insert(db.pool(), &rec).await.unwrap();

        let n = repo
            .mark_returned(db.pool(), &rec.id, date(2026, 1, 20))
            .await
            .unwrap();
        assert_eq!(n, 0);

        repo.transition(db.pool(), &rec.id, BorrowStatus::Pending, BorrowStatus::Approved)
            .await
            .unwrap();
        let n = repo
            .mark_returned(db.pool(), &rec.id, date(2026, 1, 20))
            .await
            .unwrap();
        assert_eq!(n, 1);

        let found = repo.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(found.status, BorrowStatus::Returned);
        assert_eq!(found.return_date, Some(date(2026, 1, 20)));
    }

    #[tokio::test]
    async fn test_orphan_detection_and_guarded_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_book(&db, "b-1").await;
        let repo = db.borrows();

        let valid = record("b-1", BorrowStatus::Pending);
        let orphan = record("b-gone", BorrowStatus::Pending);
        repo.insert(db.pool(), &valid).await.unwrap();
        repo.insert(db.pool(), &orphan).await.unwrap();

        let orphans = repo.orphaned().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, orphan.id);

        // The valid record is protected by the in-statement guard
        assert_eq!(repo.delete_orphaned(&valid.id).await.unwrap(), 0);
        assert_eq!(repo.delete_orphaned(&orphan.id).await.unwrap(), 1);
        assert!(repo.get(&orphan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_window_queries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_book(&db, "b-1").await;
        let repo = db.borrows();

        let mut soon = record("b-1", BorrowStatus::Approved);
        soon.due_date = date(2026, 2, 3);
        let mut late = record("b-1", BorrowStatus::Approved);
        late.due_date = date(2026, 1, 30);
        repo.insert(db.pool(), &soon).await.unwrap();
        repo.insert(db.pool(), &late).await.unwrap();

        let today = date(2026, 2, 1);
        let window = repo
            .approved_due_between(today, date(2026, 2, 3))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, soon.id);

        let overdue = repo.approved_overdue(today).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);
    }
}
