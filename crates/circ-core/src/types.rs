//! # Domain Types
//!
//! Core domain types for the Circulate lending backend.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐  ┌────────────────┐  ┌────────────────┐         │
//! │  │     Book      │  │  BorrowRecord  │  │      Fine      │         │
//! │  │  ───────────  │  │  ────────────  │  │  ────────────  │         │
//! │  │ total_copies  │  │  issue_date    │  │  amount_cents  │         │
//! │  │ copies_avail  │  │  due_date      │  │  amount_paid   │         │
//! │  │               │  │  status        │  │  status        │         │
//! │  └───────────────┘  └────────────────┘  └────────────────┘         │
//! │                                                                     │
//! │  ┌───────────────┐  ┌────────────────┐  ┌────────────────┐         │
//! │  │    Payment    │  │  Reservation   │  │  Notification  │         │
//! │  │  (append-only)│  │  notified_date │  │  (outbox row)  │         │
//! │  └───────────────┘  └────────────────┘  └────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Book: `0 <= copies_available <= total_copies`, always
//! - Fine: `0 <= amount_paid <= amount`
//! - Payment rows are never mutated or deleted
//! - BorrowRecord/Fine/Reservation are mutated only through their
//!   workflow component

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Book
// =============================================================================

/// A book title with its copy counters.
///
/// `copies_available` is the concurrency hot spot of the whole system; it is
/// only ever mutated through the inventory ledger's atomic conditional
/// updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Book {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub title: String,
    pub author: String,
    pub category: String,

    /// ISBN if known.
    pub isbn: Option<String>,

    /// Total copies the library owns.
    pub total_copies: i64,

    /// Copies currently on the shelf. Bounded by `[0, total_copies]`.
    pub copies_available: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Checks whether at least one copy is on the shelf.
    #[inline]
    pub fn has_available(&self) -> bool {
        self.copies_available > 0
    }
}

// =============================================================================
// Member
// =============================================================================

/// A library member.
///
/// Registration and authentication live outside the engine; the engine only
/// reads members (through the member directory) to enforce the lending gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub contact: Option<String>,

    /// Inactive members cannot start new borrows.
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Borrow Status
// =============================================================================

/// The status of a borrow request.
///
/// ```text
///            approve              return_book
///  PENDING ──────────► APPROVED ─────────────► RETURNED (terminal)
///     │
///     │ reject
///     ▼
///  REJECTED (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BorrowStatus {
    /// Request created, awaiting a decision.
    Pending,
    /// Copy handed out; inventory decremented.
    Approved,
    /// Request refused; no inventory effect.
    Rejected,
    /// Copy back on the shelf; record is immutable from here.
    Returned,
}

impl BorrowStatus {
    /// The snake_case form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Pending => "pending",
            BorrowStatus::Approved => "approved",
            BorrowStatus::Rejected => "rejected",
            BorrowStatus::Returned => "returned",
        }
    }

    /// Whether the record can never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BorrowStatus::Rejected | BorrowStatus::Returned)
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for BorrowStatus {
    fn default() -> Self {
        BorrowStatus::Pending
    }
}

// =============================================================================
// Borrow Record
// =============================================================================

/// A borrow request from creation through return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BorrowRecord {
    pub id: String,
    pub member_id: String,
    pub book_id: String,

    /// The day the request was created.
    pub issue_date: NaiveDate,

    /// `issue_date + borrow_duration_days` (from the lending policy).
    pub due_date: NaiveDate,

    /// Set when the book comes back; None while out or never approved.
    pub return_date: Option<NaiveDate>,

    pub status: BorrowStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BorrowRecord {
    /// Days overdue as of `today` (or as of the return date once returned).
    /// Zero or negative means not overdue.
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        let reference = self.return_date.unwrap_or(today);
        (reference - self.due_date).num_days()
    }

    /// Whether the book is out past its due date as of `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == BorrowStatus::Approved
            && self.return_date.is_none()
            && today > self.due_date
    }
}

// =============================================================================
// Fine Status
// =============================================================================

/// The status of a fine.
///
/// UNPAID and PARTIALLY_PAID are "outstanding" (they block new borrows);
/// PAID and WAIVED are "settled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FineStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Waived,
}

impl FineStatus {
    /// The snake_case form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            FineStatus::Unpaid => "unpaid",
            FineStatus::PartiallyPaid => "partially_paid",
            FineStatus::Paid => "paid",
            FineStatus::Waived => "waived",
        }
    }

    /// UNPAID or PARTIALLY_PAID: still blocks the lending gate.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, FineStatus::Unpaid | FineStatus::PartiallyPaid)
    }

    /// PAID or WAIVED: no further payments accepted.
    pub fn is_settled(&self) -> bool {
        matches!(self, FineStatus::Paid | FineStatus::Waived)
    }
}

impl std::fmt::Display for FineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for FineStatus {
    fn default() -> Self {
        FineStatus::Unpaid
    }
}

// =============================================================================
// Fine
// =============================================================================

/// An overdue or manual fine against a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Fine {
    pub id: String,
    pub member_id: String,

    /// The borrow record that generated this fine; None for manual fines.
    /// At most one system-generated fine exists per borrow record.
    pub borrow_record_id: Option<String>,

    /// Full fine amount in cents.
    pub amount_cents: i64,

    /// Cents paid so far. Invariant: `0 <= amount_paid_cents <= amount_cents`.
    pub amount_paid_cents: i64,

    pub status: FineStatus,

    /// Human-readable reason; waivers append an audit suffix here.
    pub reason: String,

    pub issue_date: NaiveDate,

    /// The day the fine became PAID or WAIVED.
    pub settled_date: Option<NaiveDate>,
}

impl Fine {
    /// Returns the full amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Returns the amount paid so far as Money.
    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    /// Remaining balance: `amount - amount_paid`.
    #[inline]
    pub fn amount_due(&self) -> Money {
        self.amount() - self.amount_paid()
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash at the desk.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Online payment recorded manually.
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a fine.
///
/// Append-only ledger entry; a fine can have multiple payments. Rows are
/// never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub fine_id: String,
    pub member_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub paid_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Reservation Status
// =============================================================================

/// The status of a reservation.
///
/// ```text
///            approve              fulfill
///  PENDING ──────────► APPROVED ──────────► FULFILLED (terminal)
///     │                   │
///     └────────┬──────────┘
///              │ cancel (any non-terminal state)
///              ▼
///          CANCELLED (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Fulfilled,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Fulfilled | ReservationStatus::Cancelled)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ReservationStatus {
    fn default() -> Self {
        ReservationStatus::Pending
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// A reservation for a book that may currently be out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub member_id: String,
    pub book_id: String,
    pub status: ReservationStatus,
    pub reservation_date: NaiveDate,

    /// The day the member was told the book is ready.
    pub notified_date: Option<NaiveDate>,

    /// `notified_date + reservation_expiry_days`; the pickup deadline.
    pub expiry_date: Option<NaiveDate>,
}

impl Reservation {
    /// Whether the pickup window has closed as of `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.status == ReservationStatus::Approved
            && self.expiry_date.is_some_and(|expiry| expiry < today)
    }
}

// =============================================================================
// Notification (outbox)
// =============================================================================

/// Notification category: which lifecycle event produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    DueSoon,
    Overdue,
    ReservationReady,
    FineIssued,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::DueSoon => "due_soon",
            NotificationCategory::Overdue => "overdue",
            NotificationCategory::ReservationReady => "reservation_ready",
            NotificationCategory::FineIssued => "fine_issued",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the notification outbox.
///
/// Uses the outbox pattern: every event handed to the delivery sink is first
/// persisted here, then the delivery outcome is written back. Delivery
/// success or failure never affects engine state beyond this audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: String,
    pub member_id: String,

    /// Member contact info at the time of the event (frozen).
    pub member_name: String,
    pub member_email: String,
    pub member_contact: Option<String>,

    pub category: NotificationCategory,

    /// The borrow record / reservation / fine that triggered the event.
    pub related_entity_id: Option<String>,

    pub subject: String,
    pub message: String,

    pub status: NotificationStatus,
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_borrow_status_terminal() {
        assert!(!BorrowStatus::Pending.is_terminal());
        assert!(!BorrowStatus::Approved.is_terminal());
        assert!(BorrowStatus::Rejected.is_terminal());
        assert!(BorrowStatus::Returned.is_terminal());
    }

    #[test]
    fn test_fine_status_partitions() {
        assert!(FineStatus::Unpaid.is_outstanding());
        assert!(FineStatus::PartiallyPaid.is_outstanding());
        assert!(!FineStatus::Paid.is_outstanding());
        assert!(!FineStatus::Waived.is_outstanding());

        assert!(FineStatus::Paid.is_settled());
        assert!(FineStatus::Waived.is_settled());
        assert!(!FineStatus::Unpaid.is_settled());
    }

    #[test]
    fn test_fine_amount_due() {
        let fine = Fine {
            id: "f-1".to_string(),
            member_id: "m-1".to_string(),
            borrow_record_id: None,
            amount_cents: 500,
            amount_paid_cents: 200,
            status: FineStatus::PartiallyPaid,
            reason: "test".to_string(),
            issue_date: date(2026, 1, 1),
            settled_date: None,
        };
        assert_eq!(fine.amount_due().cents(), 300);
    }

    #[test]
    fn test_days_overdue_uses_return_date_when_present() {
        let record = BorrowRecord {
            id: "r-1".to_string(),
            member_id: "m-1".to_string(),
            book_id: "b-1".to_string(),
            issue_date: date(2026, 1, 1),
            due_date: date(2026, 1, 15),
            return_date: Some(date(2026, 1, 20)),
            status: BorrowStatus::Returned,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        // Returned 5 days late; "today" is irrelevant once returned
        assert_eq!(record.days_overdue(date(2026, 3, 1)), 5);
    }

    #[test]
    fn test_is_overdue_only_for_unreturned_approved() {
        let mut record = BorrowRecord {
            id: "r-1".to_string(),
            member_id: "m-1".to_string(),
            book_id: "b-1".to_string(),
            issue_date: date(2026, 1, 1),
            due_date: date(2026, 1, 15),
            return_date: None,
            status: BorrowStatus::Approved,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(record.is_overdue(date(2026, 1, 16)));
        assert!(!record.is_overdue(date(2026, 1, 15)));

        record.status = BorrowStatus::Pending;
        assert!(!record.is_overdue(date(2026, 1, 16)));
    }

    #[test]
    fn test_reservation_expiry() {
        let reservation = Reservation {
            id: "res-1".to_string(),
            member_id: "m-1".to_string(),
            book_id: "b-1".to_string(),
            status: ReservationStatus::Approved,
            reservation_date: date(2026, 1, 1),
            notified_date: Some(date(2026, 1, 2)),
            expiry_date: Some(date(2026, 1, 5)),
        };
        assert!(!reservation.is_expired(date(2026, 1, 5)));
        assert!(reservation.is_expired(date(2026, 1, 6)));
    }
}
