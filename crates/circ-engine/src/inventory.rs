//! # Inventory Ledger
//!
//! Owns each book's copy counters. Every mutation is a single atomic
//! conditional update so that concurrent approvals, returns, and
//! reservation notifies never race past the `[0, total_copies]` bounds.
//!
//! ## Disambiguating a refused update
//! ```text
//! try_decrement → rows_affected
//!     ├── 1: a copy was taken, fetch and return the book
//!     └── 0: follow-up read
//!          ├── book absent          → NotFound
//!          └── copies_available = 0 → CapacityExceeded
//! ```

use sqlx::{Sqlite, Transaction};
use tracing::debug;

use circ_core::{Book, LendingError, LendingResult};
use circ_db::Database;

/// The single authority over `copies_available`.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    /// Takes one copy off the shelf.
    ///
    /// Fails with `CapacityExceeded` when no copies are available and
    /// `NotFound` when the book is absent.
    pub async fn decrement(&self, book_id: &str) -> LendingResult<Book> {
        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;
        let book = self.decrement_tx(&mut tx, book_id).await?;
        tx.commit().await.map_err(circ_db::DbError::from)?;
        Ok(book)
    }

    /// Puts one copy back on the shelf.
    ///
    /// The counter is capped at `total_copies`; incrementing a full shelf
    /// is a no-op that returns the unchanged book. Fails with `NotFound`
    /// when the book is absent.
    pub async fn increment(&self, book_id: &str) -> LendingResult<Book> {
        let mut tx = self.db.pool().begin().await.map_err(circ_db::DbError::from)?;
        let book = self.increment_tx(&mut tx, book_id).await?;
        tx.commit().await.map_err(circ_db::DbError::from)?;
        Ok(book)
    }

    /// Number of copies currently on the shelf.
    pub async fn available(&self, book_id: &str) -> LendingResult<i64> {
        let book = self
            .db
            .books()
            .get(book_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Book", book_id))?;
        Ok(book.copies_available)
    }

    /// Decrement inside a caller-owned transaction (workflow steps ride in
    /// the same unit of work as the status transition).
    pub(crate) async fn decrement_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        book_id: &str,
    ) -> LendingResult<Book> {
        let books = self.db.books();

        let rows = books.try_decrement(&mut **tx, book_id).await?;
        if rows == 0 {
            // Guard refused: book missing or at the floor
            return match books.get_in(&mut **tx, book_id).await? {
                None => Err(LendingError::not_found("Book", book_id)),
                Some(_) => Err(LendingError::CapacityExceeded {
                    book_id: book_id.to_string(),
                }),
            };
        }

        let book = books
            .get_in(&mut **tx, book_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Book", book_id))?;

        debug!(book_id = %book_id, copies_available = book.copies_available, "copy taken");
        Ok(book)
    }

    /// Increment inside a caller-owned transaction.
    pub(crate) async fn increment_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        book_id: &str,
    ) -> LendingResult<Book> {
        let books = self.db.books();

        let rows = books.try_increment(&mut **tx, book_id).await?;

        let book = books
            .get_in(&mut **tx, book_id)
            .await?
            .ok_or_else(|| LendingError::not_found("Book", book_id))?;

        if rows == 0 {
            // Already at total_copies: capped, not an error
            debug!(book_id = %book_id, "increment capped at total_copies");
        } else {
            debug!(book_id = %book_id, copies_available = book.copies_available, "copy restored");
        }

        Ok(book)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_book, test_db};

    #[tokio::test]
    async fn test_decrement_to_zero_then_capacity_exceeded() {
        let db = test_db().await;
        seed_book(&db, "b-1", 2, 2).await;
        let ledger = InventoryLedger::new(db);

        assert_eq!(ledger.decrement("b-1").await.unwrap().copies_available, 1);
        assert_eq!(ledger.decrement("b-1").await.unwrap().copies_available, 0);

        let err = ledger.decrement("b-1").await.unwrap_err();
        assert!(matches!(err, LendingError::CapacityExceeded { .. }));

        // Counter never left the bounds
        assert_eq!(ledger.available("b-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_caps_silently() {
        let db = test_db().await;
        seed_book(&db, "b-1", 2, 1).await;
        let ledger = InventoryLedger::new(db);

        assert_eq!(ledger.increment("b-1").await.unwrap().copies_available, 2);
        // At the cap: no-op, unchanged book, no error
        assert_eq!(ledger.increment("b-1").await.unwrap().copies_available, 2);
    }

    #[tokio::test]
    async fn test_missing_book_is_not_found() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db);

        assert!(matches!(
            ledger.decrement("nope").await.unwrap_err(),
            LendingError::NotFound { entity: "Book", .. }
        ));
        assert!(matches!(
            ledger.increment("nope").await.unwrap_err(),
            LendingError::NotFound { entity: "Book", .. }
        ));
        assert!(matches!(
            ledger.available("nope").await.unwrap_err(),
            LendingError::NotFound { entity: "Book", .. }
        ));
    }
}
