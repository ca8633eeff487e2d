//! # Notification Outbox Repository
//!
//! Database operations for the notification outbox.
//!
//! ## Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Notification Outbox Flow                        │
//! │                                                                     │
//! │  Engine event (fine issued, reservation ready, due soon, overdue)   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  insert row (status = pending)   ← the audit record                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  hand to NotificationSink (fire-and-forget)                         │
//! │       │                                                             │
//! │       ├── delivered  → mark_sent                                    │
//! │       └── failed     → mark_failed (error preserved)                │
//! │                                                                     │
//! │  Delivery outcome never changes engine state beyond this row.       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use circ_core::{Notification, NotificationCategory, NotificationStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT id, member_id, member_name, member_email, member_contact,
           category, related_entity_id, subject, message,
           status, error_message, created_at, sent_at
    FROM notifications
"#;

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Gets a notification by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    /// Inserts a new outbox row.
    pub async fn insert(
        &self,
        ex: impl SqliteExecutor<'_>,
        notification: &Notification,
    ) -> DbResult<()> {
        debug!(id = %notification.id, category = %notification.category,
               member_id = %notification.member_id, "inserting notification");

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, member_id, member_name, member_email, member_contact,
                category, related_entity_id, subject, message,
                status, error_message, created_at, sent_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.member_id)
        .bind(&notification.member_name)
        .bind(&notification.member_email)
        .bind(&notification.member_contact)
        .bind(notification.category)
        .bind(&notification.related_entity_id)
        .bind(&notification.subject)
        .bind(&notification.message)
        .bind(notification.status)
        .bind(&notification.error_message)
        .bind(notification.created_at)
        .bind(notification.sent_at)
        .execute(ex)
        .await?;

        Ok(())
    }

    /// Marks a row delivered.
    pub async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'sent', sent_at = ?2, error_message = NULL WHERE id = ?1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks a row failed, preserving the delivery error.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET status = 'failed', error_message = ?2 WHERE id = ?1")
                .bind(id)
                .bind(error)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// Checks whether an un-failed notification already exists for the
    /// (category, related entity) pair. Used by the daily scan to avoid
    /// issuing duplicates.
    pub async fn exists_undelivered_or_sent(
        &self,
        category: NotificationCategory,
        related_entity_id: &str,
    ) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM notifications
            WHERE category = ?1 AND related_entity_id = ?2 AND status != 'failed'
            LIMIT 1
            "#,
        )
        .bind(category)
        .bind(related_entity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    /// Lists a member's notifications, newest first.
    pub async fn by_member(&self, member_id: &str) -> DbResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "{SELECT_COLUMNS} WHERE member_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Lists notifications in a given delivery status, oldest first.
    pub async fn by_status(&self, status: NotificationStatus) -> DbResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "{SELECT_COLUMNS} WHERE status = ?1 ORDER BY created_at"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
