//! # circ-engine: The Lending Lifecycle Engine
//!
//! The interacting state machines that govern book inventory, borrow
//! requests, overdue fines, payments, and reservations.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Lending Engine                                 │
//! │                                                                     │
//! │  ┌──────────────────┐          ┌──────────────────┐                 │
//! │  │  BorrowWorkflow  │─────────►│  InventoryLedger │◄──────────┐     │
//! │  │ issue / approve  │ decrement│  atomic counter  │           │     │
//! │  │ reject / return  │ increment│  updates         │           │     │
//! │  └───────┬──────────┘          └──────────────────┘           │     │
//! │          │ overdue return                         availability│     │
//! │          ▼                                                    │     │
//! │  ┌──────────────────┐          ┌────────────────────┐         │     │
//! │  │    FineEngine    │          │ReservationWorkflow │─────────┘     │
//! │  │ calculate / pay  │          │ create / approve   │               │
//! │  │ waive / settle   │          │ notify / fulfill   │               │
//! │  └───────▲──────────┘          └────────────────────┘               │
//! │          │ outstanding?                                             │
//! │  ┌───────┴──────────┐          ┌──────────────────┐                 │
//! │  │   LendingGate    │          │   DueDateScan    │                 │
//! │  │ single authority │          │ recurring sweep  │                 │
//! │  └──────────────────┘          └──────────────────┘                 │
//! │                                                                     │
//! │  Collaborators: SettingsProvider · MemberDirectory ·                │
//! │                 NotificationSink (behind the Outbox)                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use circ_db::{Database, DbConfig};
//! use circ_engine::LendingEngine;
//!
//! let db = Database::new(DbConfig::new("./circulate.db")).await?;
//! let engine = LendingEngine::new(db);
//!
//! let record = engine.borrows().issue("m-42", "b-7").await?;
//! engine.borrows().approve(&record.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod borrow;
pub mod fine;
pub mod gate;
pub mod inventory;
pub mod members;
pub mod notify;
pub mod reservation;
pub mod scan;
pub mod settings;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use borrow::{BorrowWorkflow, ReturnOutcome};
pub use fine::FineEngine;
pub use gate::{GateDecision, GateViolation, LendingGate};
pub use inventory::InventoryLedger;
pub use members::{DbMemberDirectory, MemberDirectory};
pub use notify::{DeliveryError, LogSink, NotificationEvent, NotificationSink, Outbox};
pub use reservation::ReservationWorkflow;
pub use scan::{DueDateScan, ScanReport};
pub use settings::{DbSettingsProvider, SettingsProvider, StaticSettings};

use std::sync::Arc;

use circ_db::Database;

// =============================================================================
// Engine Facade
// =============================================================================

/// Wires the components to one database and one set of collaborators.
///
/// Components are cheap handles over the shared pool; accessors hand out
/// fresh ones the way the database hands out repositories.
#[derive(Clone)]
pub struct LendingEngine {
    db: Database,
    settings: Arc<dyn SettingsProvider>,
    directory: Arc<dyn MemberDirectory>,
    sink: Arc<dyn NotificationSink>,
}

impl LendingEngine {
    /// Engine over a database with the DB-backed settings provider, the
    /// DB-backed member directory, and the log sink.
    pub fn new(db: Database) -> Self {
        LendingEngine {
            settings: Arc::new(DbSettingsProvider::new(db.clone())),
            directory: Arc::new(DbMemberDirectory::new(db.clone())),
            sink: Arc::new(LogSink),
            db,
        }
    }

    /// Replaces the settings provider.
    pub fn with_settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the member directory.
    pub fn with_directory(mut self, directory: Arc<dyn MemberDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Replaces the notification sink.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The inventory ledger.
    pub fn inventory(&self) -> InventoryLedger {
        InventoryLedger::new(self.db.clone())
    }

    /// The borrow workflow.
    pub fn borrows(&self) -> BorrowWorkflow {
        BorrowWorkflow::new(
            self.db.clone(),
            self.settings.clone(),
            self.directory.clone(),
            self.sink.clone(),
        )
    }

    /// The fine engine.
    pub fn fines(&self) -> FineEngine {
        FineEngine::new(
            self.db.clone(),
            self.settings.clone(),
            self.directory.clone(),
            self.sink.clone(),
        )
    }

    /// The reservation workflow.
    pub fn reservations(&self) -> ReservationWorkflow {
        ReservationWorkflow::new(
            self.db.clone(),
            self.settings.clone(),
            self.directory.clone(),
            self.sink.clone(),
        )
    }

    /// The lending gate.
    pub fn gate(&self) -> LendingGate {
        LendingGate::new(self.db.clone(), self.directory.clone())
    }

    /// The due-date scan.
    pub fn scan(&self) -> DueDateScan {
        DueDateScan::new(
            self.db.clone(),
            self.settings.clone(),
            self.directory.clone(),
            self.sink.clone(),
        )
    }
}

// =============================================================================
// Facade Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{recording_sink, seed_book, seed_member, test_db};
    use circ_core::{BorrowStatus, FineStatus, LendingError, Money, PaymentMethod};

    /// The whole lifecycle through the facade: borrow, late return, fine,
    /// payment, gate unblocking.
    #[tokio::test]
    async fn test_full_lifecycle() {
        let db = test_db().await;
        seed_member(&db, "m-1", true).await;
        seed_book(&db, "b-1", 2, 2).await;

        let (sink, _) = recording_sink(false);
        let engine = LendingEngine::new(db.clone()).with_sink(sink);

        // Borrow and approve
        let record = engine.borrows().issue("m-1", "b-1").await.unwrap();
        let record = engine.borrows().approve(&record.id).await.unwrap();
        assert_eq!(record.status, BorrowStatus::Approved);
        assert_eq!(engine.inventory().available("b-1").await.unwrap(), 1);

        // A manual fine closes the gate
        let fine = engine
            .fines()
            .create_manual("m-1", Money::from_cents(500), "damaged spine")
            .await
            .unwrap();
        assert!(!engine.gate().can_borrow("m-1", "b-1").await.unwrap());
        let err = engine
            .borrows()
            .self_service_borrow("m-1", "b-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::BusinessRuleViolation(_)));

        // Settling the fine reopens it
        engine
            .fines()
            .record_payment(&fine.id, Money::from_cents(500), PaymentMethod::Cash, "")
            .await
            .unwrap();
        assert_eq!(
            engine.fines().get(&fine.id).await.unwrap().status,
            FineStatus::Paid
        );
        assert_eq!(
            engine.fines().member_outstanding("m-1").await.unwrap(),
            Money::zero()
        );

        // Returning the first book makes room; the gate now allows a
        // different book but blocks the same unreturned one
        engine.borrows().return_book(&record.id).await.unwrap();
        assert!(engine.gate().can_borrow("m-1", "b-1").await.unwrap());
        assert_eq!(engine.inventory().available("b-1").await.unwrap(), 2);
    }
}
