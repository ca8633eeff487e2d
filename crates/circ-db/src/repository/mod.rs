//! # Repository Module
//!
//! One repository per entity, each owning that entity's SQL.
//!
//! ## Organization
//! - [`book`] - Books and the atomic copy-counter updates
//! - [`member`] - Members
//! - [`borrow`] - Borrow records and status-guarded transitions
//! - [`fine`] - Fines and the append-only payment ledger
//! - [`reservation`] - Reservations
//! - [`notification`] - The notification outbox
//! - [`settings`] - The single-row lending policy
//!
//! ## Conventions
//! - Mutations that participate in engine transactions take an
//!   `impl SqliteExecutor` parameter; standalone reads use the pool
//! - Status-guarded updates return `rows_affected`; the engine turns a zero
//!   into the right domain error after a follow-up read

pub mod book;
pub mod borrow;
pub mod fine;
pub mod member;
pub mod notification;
pub mod reservation;
pub mod settings;

use uuid::Uuid;

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
