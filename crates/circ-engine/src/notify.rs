//! # Notification Events and Outbox
//!
//! Fire-and-forget notification dispatch with a persistent audit trail.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Engine operation (return creates fine, reservation notify, scan)   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Outbox::record   → notifications row, status = pending             │
//! │       │             (inside the operation's transaction when the    │
//! │       │              operation has one)                             │
//! │       ▼                                                             │
//! │  Outbox::deliver  → NotificationSink::deliver (after commit)        │
//! │       │                                                             │
//! │       ├── Ok  → row marked sent                                     │
//! │       └── Err → row marked failed, warn! logged                     │
//! │                                                                     │
//! │  Delivery outcome never fails the triggering operation.             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteExecutor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use circ_core::{
    Fine, LendingResult, Member, Notification, NotificationCategory, NotificationStatus,
};
use circ_db::repository::generate_id;
use circ_db::Database;

// =============================================================================
// Event
// =============================================================================

/// A notification event with the member contact info frozen at event time.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub member: Member,
    pub category: NotificationCategory,
    /// The borrow record / reservation / fine that triggered the event.
    pub related_entity_id: Option<String>,
    pub subject: String,
    pub message: String,
}

impl NotificationEvent {
    /// A book is due within the reminder window.
    pub fn due_soon(member: Member, record_id: &str, due_date: chrono::NaiveDate) -> Self {
        let message = format!(
            "Dear {}, your borrowed book is due on {}. Please return it on time to avoid fines.",
            member.name, due_date
        );
        NotificationEvent {
            member,
            category: NotificationCategory::DueSoon,
            related_entity_id: Some(record_id.to_string()),
            subject: "Book due date reminder".to_string(),
            message,
        }
    }

    /// A book is out past its due date.
    pub fn overdue(member: Member, record_id: &str, due_date: chrono::NaiveDate) -> Self {
        let message = format!(
            "Dear {}, your borrowed book was due on {} and is now overdue. \
             Please return it; late fees may apply.",
            member.name, due_date
        );
        NotificationEvent {
            member,
            category: NotificationCategory::Overdue,
            related_entity_id: Some(record_id.to_string()),
            subject: "Overdue book notice".to_string(),
            message,
        }
    }

    /// A reserved book is ready for pickup.
    pub fn reservation_ready(
        member: Member,
        reservation_id: &str,
        expiry_date: chrono::NaiveDate,
    ) -> Self {
        let message = format!(
            "Dear {}, your reserved book is available for pickup until {}.",
            member.name, expiry_date
        );
        NotificationEvent {
            member,
            category: NotificationCategory::ReservationReady,
            related_entity_id: Some(reservation_id.to_string()),
            subject: "Reserved book available".to_string(),
            message,
        }
    }

    /// A fine was issued against the member.
    pub fn fine_issued(member: Member, fine: &Fine) -> Self {
        let message = format!(
            "Dear {}, a fine of {} has been issued: {}.",
            member.name,
            fine.amount(),
            fine.reason
        );
        NotificationEvent {
            member,
            category: NotificationCategory::FineIssued,
            related_entity_id: Some(fine.id.clone()),
            subject: "Fine notice".to_string(),
            message,
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Delivery failure reported by a sink.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Accepts fire-and-forget notification events.
///
/// Implementations own the transport (email, SMS, webhooks). Delivery
/// success or failure does not affect engine state beyond the outbox row.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), DeliveryError>;
}

/// Sink that writes events to the log. The default when no transport is
/// wired up.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), DeliveryError> {
        info!(
            member_id = %event.member.id,
            category = %event.category,
            subject = %event.subject,
            "notification"
        );
        Ok(())
    }
}

// =============================================================================
// Outbox
// =============================================================================

/// Persists every event as an audit row, then hands it to the sink.
#[derive(Clone)]
pub struct Outbox {
    db: Database,
    sink: Arc<dyn NotificationSink>,
}

impl Outbox {
    pub fn new(db: Database, sink: Arc<dyn NotificationSink>) -> Self {
        Outbox { db, sink }
    }

    /// Persists the audit row for an event without delivering it.
    ///
    /// Takes an executor so callers can include the row in their own
    /// transaction; deliver after commit with [`Outbox::deliver`].
    pub async fn record(
        &self,
        ex: impl SqliteExecutor<'_>,
        event: &NotificationEvent,
    ) -> LendingResult<Notification> {
        let notification = Notification {
            id: generate_id(),
            member_id: event.member.id.clone(),
            member_name: event.member.name.clone(),
            member_email: event.member.email.clone(),
            member_contact: event.member.contact.clone(),
            category: event.category,
            related_entity_id: event.related_entity_id.clone(),
            subject: event.subject.clone(),
            message: event.message.clone(),
            status: NotificationStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            sent_at: None,
        };

        self.db.notifications().insert(ex, &notification).await?;
        Ok(notification)
    }

    /// Delivers a previously recorded event and writes the outcome back.
    ///
    /// A sink failure is tolerated: the row is marked failed and the error
    /// is logged, nothing propagates.
    pub async fn deliver(
        &self,
        mut notification: Notification,
        event: &NotificationEvent,
    ) -> LendingResult<Notification> {
        match self.sink.deliver(event).await {
            Ok(()) => {
                let at = Utc::now();
                self.db.notifications().mark_sent(&notification.id, at).await?;
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(at);
            }
            Err(err) => {
                warn!(
                    notification_id = %notification.id,
                    member_id = %notification.member_id,
                    error = %err,
                    "notification delivery failed"
                );
                self.db
                    .notifications()
                    .mark_failed(&notification.id, &err.to_string())
                    .await?;
                notification.status = NotificationStatus::Failed;
                notification.error_message = Some(err.to_string());
            }
        }

        Ok(notification)
    }

    /// Records and delivers in one step, for operations without their own
    /// transaction.
    pub async fn dispatch(&self, event: NotificationEvent) -> LendingResult<Notification> {
        debug!(category = %event.category, member_id = %event.member.id, "dispatching notification");

        let notification = self.record(self.db.pool(), &event).await?;
        self.deliver(notification, &event).await
    }

    /// Whether an un-failed notification already exists for the
    /// (category, related entity) pair.
    pub async fn already_issued(
        &self,
        category: NotificationCategory,
        related_entity_id: &str,
    ) -> LendingResult<bool> {
        Ok(self
            .db
            .notifications()
            .exists_undelivered_or_sent(category, related_entity_id)
            .await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
