//! # Book Repository
//!
//! Database operations for books, including the atomic copy-counter updates
//! the inventory ledger is built on.
//!
//! ## Copy Counter Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Copy Counter Update Strategy                       │
//! │                                                                     │
//! │  ❌ WRONG: read-then-write (races past the bounds)                  │
//! │     let book = get(id); book.copies_available -= 1; save(book);     │
//! │                                                                     │
//! │  ✅ CORRECT: single conditional update                              │
//! │     UPDATE books SET copies_available = copies_available - 1        │
//! │     WHERE id = ? AND copies_available > 0                           │
//! │                                                                     │
//! │  rows_affected = 0 means the guard failed (book missing or at the   │
//! │  bound); the caller disambiguates with a follow-up read.            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use circ_core::Book;

/// Repository for book database operations.
#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    /// Creates a new BookRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookRepository { pool }
    }

    /// Gets a book by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Book>> {
        self.get_in(&self.pool, id).await
    }

    /// Gets a book by its ID on the given executor.
    pub async fn get_in(&self, ex: impl SqliteExecutor<'_>, id: &str) -> DbResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, category, isbn,
                   total_copies, copies_available,
                   created_at, updated_at
            FROM books
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(ex)
        .await?;

        Ok(book)
    }

    /// Checks whether a book exists.
    pub async fn exists(&self, ex: impl SqliteExecutor<'_>, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM books WHERE id = ?1")
            .bind(id)
            .fetch_optional(ex)
            .await?;

        Ok(found.is_some())
    }

    /// Lists all books, ordered by title.
    pub async fn list(&self) -> DbResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, category, isbn,
                   total_copies, copies_available,
                   created_at, updated_at
            FROM books
            ORDER BY title
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Inserts a new book.
    pub async fn insert(&self, book: &Book) -> DbResult<()> {
        debug!(id = %book.id, title = %book.title, "inserting book");

        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, author, category, isbn,
                total_copies, copies_available,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(&book.isbn)
        .bind(book.total_copies)
        .bind(book.copies_available)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Attempts to take one copy off the shelf.
    ///
    /// Single conditional update guarded by `copies_available > 0`.
    ///
    /// ## Returns
    /// `rows_affected`: 1 when a copy was taken, 0 when the book is missing
    /// or no copies are available. The caller disambiguates.
    pub async fn try_decrement(&self, ex: impl SqliteExecutor<'_>, id: &str) -> DbResult<u64> {
        debug!(id = %id, "decrementing available copies");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE books
            SET copies_available = copies_available - 1,
                updated_at = ?2
            WHERE id = ?1 AND copies_available > 0
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(ex)
        .await?;

        Ok(result.rows_affected())
    }

    /// Attempts to put one copy back on the shelf.
    ///
    /// Single conditional update guarded by `copies_available <
    /// total_copies`, so the counter never exceeds the cap.
    ///
    /// ## Returns
    /// `rows_affected`: 1 when a copy was restored, 0 when the book is
    /// missing or already at `total_copies`.
    pub async fn try_increment(&self, ex: impl SqliteExecutor<'_>, id: &str) -> DbResult<u64> {
        debug!(id = %id, "incrementing available copies");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE books
            SET copies_available = copies_available + 1,
                updated_at = ?2
            WHERE id = ?1 AND copies_available < total_copies
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(ex)
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
    use chrono::Utc;
    use circ_core::Book;

    fn book(id: &str, total: i64, available: i64) -> Book {
        let now = Utc::now();
        Book {
            id: id.to_string(),
            title: "The Test Book".to_string(),
            author: "A. Author".to_string(),
            category: "fiction".to_string(),
            isbn: None,
            total_copies: total,
            copies_available: available,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.books();

        repo.insert(&book("b-1", 3, 3)).await.unwrap();

        let found = repo.get("b-1").await.unwrap().unwrap();
        assert_eq!(found.total_copies, 3);
        assert_eq!(found.copies_available, 3);

        assert!(repo.get("b-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_decrement_stops_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.books();

        repo.insert(&book("b-1", 2, 2)).await.unwrap();

        assert_eq!(repo.try_decrement(db.pool(), "b-1").await.unwrap(), 1);
        assert_eq!(repo.try_decrement(db.pool(), "b-1").await.unwrap(), 1);
        // Guard refuses the third take
        assert_eq!(repo.try_decrement(db.pool(), "b-1").await.unwrap(), 0);

        let found = repo.get("b-1").await.unwrap().unwrap();
        assert_eq!(found.copies_available, 0);
    }

    #[tokio::test]
    async fn test_increment_caps_at_total() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.books();

        repo.insert(&book("b-1", 2, 1)).await.unwrap();

        assert_eq!(repo.try_increment(db.pool(), "b-1").await.unwrap(), 1);
        // Already at total_copies: guard refuses
        assert_eq!(repo.try_increment(db.pool(), "b-1").await.unwrap(), 0);

        let found = repo.get("b-1").await.unwrap().unwrap();
        assert_eq!(found.copies_available, 2);
    }

    #[tokio::test]
    async fn test_counter_ops_on_missing_book_affect_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.books();

        assert_eq!(repo.try_decrement(db.pool(), "nope").await.unwrap(), 0);
        assert_eq!(repo.try_increment(db.pool(), "nope").await.unwrap(), 0);
        assert!(!repo.exists(db.pool(), "nope").await.unwrap());
    }
}
