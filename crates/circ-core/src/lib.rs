//! # circ-core: Pure Domain Logic for Circulate
//!
//! This crate is the heart of the Circulate lending backend. It contains the
//! domain types and business rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Circulate Architecture                          │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                  Callers (HTTP controllers, CLI)              │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │                circ-engine (lifecycle engine)                 │ │
//! │  │   BorrowWorkflow │ FineEngine │ ReservationWorkflow │ Gate    │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │               ★ circ-core (THIS CRATE) ★                      │ │
//! │  │                                                               │ │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐  │ │
//! │  │   │   types   │  │   money   │  │   error   │  │validation│  │ │
//! │  │   │   Book    │  │   Money   │  │ Lending-  │  │  checks  │  │ │
//! │  │   │   Fine    │  │  (cents)  │  │  Error    │  │          │  │ │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └──────────┘  │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │                 circ-db (Database Layer)                      │ │
//! │  │           SQLite queries, migrations, repositories            │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, BorrowRecord, Fine, Payment, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - The lending error taxonomy
//! - [`policy`] - The lending policy settings struct and its defaults
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are in cents (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod policy;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{LendingError, LendingResult, ValidationError};
pub use money::Money;
pub use policy::LendingPolicy;
pub use types::*;
