//! # Reservation Repository
//!
//! Database operations for reservations. Transitions use the same
//! status-guarded conditional updates as borrow records.

use chrono::NaiveDate;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use circ_core::{Reservation, ReservationStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT id, member_id, book_id, status,
           reservation_date, notified_date, expiry_date
    FROM reservations
"#;

/// Repository for reservation database operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Gets a reservation by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Reservation>> {
        let reservation =
            sqlx::query_as::<_, Reservation>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(reservation)
    }

    /// Inserts a new reservation.
    pub async fn insert(&self, reservation: &Reservation) -> DbResult<()> {
        debug!(id = %reservation.id, member_id = %reservation.member_id,
               book_id = %reservation.book_id, "inserting reservation");

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, member_id, book_id, status,
                reservation_date, notified_date, expiry_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.member_id)
        .bind(&reservation.book_id)
        .bind(reservation.status)
        .bind(reservation.reservation_date)
        .bind(reservation.notified_date)
        .bind(reservation.expiry_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Moves a reservation from `from` to `to` if it is still in `from`.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the reservation is missing or not in `from`.
    pub async fn transition(
        &self,
        ex: impl SqliteExecutor<'_>,
        id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> DbResult<u64> {
        debug!(id = %id, from = %from, to = %to, "reservation transition");

        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = ?3
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(ex)
        .await?;

        Ok(result.rows_affected())
    }

    /// Cancels from any non-terminal state.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the reservation is missing or already
    /// terminal.
    pub async fn cancel(&self, id: &str) -> DbResult<u64> {
        debug!(id = %id, "cancelling reservation");

        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled'
            WHERE id = ?1 AND status IN ('pending', 'approved')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stamps the notified and expiry dates on an APPROVED reservation.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the reservation is missing or not APPROVED.
    pub async fn mark_notified(
        &self,
        id: &str,
        notified_date: NaiveDate,
        expiry_date: NaiveDate,
    ) -> DbResult<u64> {
        debug!(id = %id, %notified_date, %expiry_date, "marking reservation notified");

        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET notified_date = ?2, expiry_date = ?3
            WHERE id = ?1 AND status = 'approved'
            "#,
        )
        .bind(id)
        .bind(notified_date)
        .bind(expiry_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lists reservations in a given status, oldest first.
    pub async fn by_status(&self, status: ReservationStatus) -> DbResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "{SELECT_COLUMNS} WHERE status = ?1 ORDER BY reservation_date, id"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// Lists a member's reservations, newest first.
    pub async fn by_member(&self, member_id: &str) -> DbResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "{SELECT_COLUMNS} WHERE member_id = ?1 ORDER BY reservation_date DESC, id"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// Lists reservations for a book, oldest first (the pickup queue).
    pub async fn by_book(&self, book_id: &str) -> DbResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "{SELECT_COLUMNS} WHERE book_id = ?1 ORDER BY reservation_date, id"
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// APPROVED reservations whose pickup window closed before `as_of`.
    pub async fn expired(&self, as_of: NaiveDate) -> DbResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE status = 'approved'
              AND expiry_date IS NOT NULL AND expiry_date < ?1
            ORDER BY expiry_date, id"#
        ))
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
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
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reservation(status: ReservationStatus) -> Reservation {
        Reservation {
            id: generate_id(),
            member_id: "m-1".to_string(),
            book_id: "b-1".to_string(),
            status,
            reservation_date: date(2026, 1, 1),
            notified_date: None,
            expiry_date: None,
        }
    }

    #[tokio::test]
    async fn test_transition_and_cancel_guards() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.reservations();

        let res = reservation(ReservationStatus::Pending);
        repo.insert(&res).await.unwrap();

        let n = repo
            .transition(db.pool(), &res.id, ReservationStatus::Pending, ReservationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(n, 1);

        assert_eq!(repo.cancel(&res.id).await.unwrap(), 1);
        // Terminal now: both cancel and fulfill find nothing
        assert_eq!(repo.cancel(&res.id).await.unwrap(), 0);
        let n = repo
            .transition(db.pool(), &res.id, ReservationStatus::Approved, ReservationStatus::Fulfilled)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_mark_notified_requires_approved() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.reservations();

        let res = reservation(ReservationStatus::Pending);
        repo.insert(&res).await.unwrap();

        let n = repo
            .mark_notified(&res.id, date(2026, 1, 2), date(2026, 1, 5))
            .await
            .unwrap();
        assert_eq!(n, 0);

        repo.transition(db.pool(), &res.id, ReservationStatus::Pending, ReservationStatus::Approved)
            .await
            .unwrap();
        let n = repo
            .mark_notified(&res.id, date(2026, 1, 2), date(2026, 1, 5))
            .await
            .unwrap();
        assert_eq!(n, 1);

        let found = repo.get(&res.id).await.unwrap().unwrap();
        assert_eq!(found.notified_date, Some(date(2026, 1, 2)));
        assert_eq!(found.expiry_date, Some(date(2026, 1, 5)));
    }

    #[tokio::test]
    async fn test_expired_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.reservations();

        let mut stale = reservation(ReservationStatus::Approved);
        stale.expiry_date = Some(date(2026, 1, 5));
        let mut fresh = reservation(ReservationStatus::Approved);
        fresh.expiry_date = Some(date(2026, 1, 10));
        let unnotified = reservation(ReservationStatus::Approved);
        repo.insert(&stale).await.unwrap();
        repo.insert(&fresh).await.unwrap();
        repo.insert(&unnotified).await.unwrap();

        let expired = repo.expired(date(2026, 1, 6)).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
    }
}
