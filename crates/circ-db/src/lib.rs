//! # circ-db: Database Layer for Circulate
//!
//! This crate provides database access for the Circulate lending backend.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (book, borrow, fine, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use circ_db::{Database, DbConfig};
//!
//! // Create database with default config
//! let db = Database::new(DbConfig::new("path/to/circulate.db")).await?;
//!
//! // Use repositories
//! let book = db.books().get("b-42").await?;
//! ```
//!
//! ## Transactions
//!
//! Repository methods that participate in multi-step engine flows take an
//! `impl SqliteExecutor` so the engine can run them inside one transaction
//! (for example return-then-fine, which must not partially commit). The
//! pool-level convenience methods wrap those with `self.pool()`.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::book::BookRepository;
pub use repository::borrow::BorrowRepository;
pub use repository::fine::{FineRepository, FineSummary};
pub use repository::member::MemberRepository;
pub use repository::notification::NotificationRepository;
pub use repository::reservation::ReservationRepository;
pub use repository::settings::{SettingsRepository, SettingsUpdate, StoredSettings};
