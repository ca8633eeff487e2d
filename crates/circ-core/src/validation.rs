//! # Validation Module
//!
//! Input validation for the lending engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                              │
//! │                                                                     │
//! │  Layer 1: Caller (HTTP controller, CLI)                             │
//! │  └── Basic format checks, immediate feedback                        │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 2: THIS MODULE - engine input validation                     │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 3: Database (SQLite)                                         │
//! │  └── NOT NULL, UNIQUE, CHECK constraints                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation runs before any state is touched; a failed check means no
//! record was created and no counter moved.

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length accepted for entity identifiers.
const MAX_ID_LEN: usize = 64;

/// Maximum length accepted for free-text reasons and notes.
const MAX_TEXT_LEN: usize = 500;

/// Validates an entity identifier (member, book, record, fine, reservation).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 64 characters
///
/// ## Example
/// ```rust
/// use circ_core::validation::validate_id;
///
/// assert!(validate_id("member_id", "m-42").is_ok());
/// assert!(validate_id("member_id", "").is_err());
/// assert!(validate_id("member_id", "   ").is_err());
/// ```
pub fn validate_id(field: &'static str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }

    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must be strictly positive.
///
/// Used for manual fine amounts and payment amounts.
pub fn validate_positive_amount(field: &'static str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive { field });
    }
    Ok(())
}

/// Validates a free-text reason or note.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 500 characters
pub fn validate_reason(field: &'static str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }

    if value.len() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }

    Ok(())
}

/// Validates a policy day-count (borrow duration, expiry window, reminders).
pub fn validate_day_count(field: &'static str, days: i64) -> ValidationResult<()> {
    if !(1..=365).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field,
            min: 1,
            max: 365,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("member_id", "m-1").is_ok());
        assert!(validate_id("member_id", "").is_err());
        assert!(validate_id("member_id", "   ").is_err());
        assert!(validate_id("member_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_positive_amount() {
        assert!(validate_positive_amount("amount", Money::from_cents(1)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
        assert!(validate_positive_amount("amount", Money::from_cents(-5)).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("reason", "damaged cover").is_ok());
        assert!(validate_reason("reason", "").is_err());
        assert!(validate_reason("reason", &"x".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_day_count() {
        assert!(validate_day_count("borrow_duration_days", 14).is_ok());
        assert!(validate_day_count("borrow_duration_days", 0).is_err());
        assert!(validate_day_count("borrow_duration_days", 366).is_err());
    }
}
