//! # Error Types
//!
//! The lending error taxonomy for Circulate.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  circ-core errors (this file)                                       │
//! │  ├── LendingError     - The engine's public error taxonomy          │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  circ-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  Flow: ValidationError → LendingError ← DbError                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every public engine operation returns `LendingResult<T>`. Errors are
//! returned synchronously to the caller and never retried internally.

use thiserror::Error;

// =============================================================================
// Lending Error
// =============================================================================

/// The error taxonomy returned by every lending engine operation.
///
/// These represent business rule violations, illegal state transitions, and
/// resource exhaustion. They should be caught and translated to user-facing
/// messages by the calling layer.
#[derive(Debug, Error)]
pub enum LendingError {
    /// Entity cannot be found.
    ///
    /// ## When This Occurs
    /// - Book/member/record/fine/reservation ID doesn't exist
    /// - Record was deleted by the repair utility
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The entity is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Approving a borrow request that is not PENDING
    /// - Returning a record that is not APPROVED
    /// - Notifying a reservation that is not APPROVED
    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState { expected: &'static str, actual: String },

    /// No copies of the book are available.
    ///
    /// ## When This Occurs
    /// - Approving a borrow while `copies_available == 0`
    /// - Notifying a reservation while `copies_available == 0`
    #[error("no copies available for book {book_id}")]
    CapacityExceeded { book_id: String },

    /// A system-generated fine already exists for the borrow record.
    #[error("fine already exists for borrow record {borrow_record_id}")]
    DuplicateFine { borrow_record_id: String },

    /// A payment would push `amount_paid` past `amount`.
    #[error(
        "payment of {attempted_cents} cents exceeds balance of {balance_cents} cents on fine {fine_id}"
    )]
    PaymentExceedsBalance {
        fine_id: String,
        balance_cents: i64,
        attempted_cents: i64,
    },

    /// The fine is already PAID or WAIVED.
    #[error("fine {fine_id} is already settled ({status})")]
    AlreadySettled { fine_id: String, status: String },

    /// A cross-cutting lending rule blocked the operation.
    ///
    /// ## When This Occurs
    /// - The lending gate refuses a borrow (inactive member, outstanding
    ///   fines, duplicate active borrow)
    /// - The repair utility is asked to delete a valid record
    #[error("business rule violation: {0}")]
    BusinessRuleViolation(String),

    /// Input validation failed before any state was touched.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The storage layer failed. Carries the database error message.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LendingError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LendingError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an InvalidState error from an expected and an observed status.
    pub fn invalid_state(expected: &'static str, actual: impl Into<String>) -> Self {
        LendingError::InvalidState {
            expected,
            actual: actual.into(),
        }
    }

    /// Creates a BusinessRuleViolation with the given reason.
    pub fn rule(reason: impl Into<String>) -> Self {
        LendingError::BusinessRuleViolation(reason.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements. Used for early
/// validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// Invalid format (e.g. malformed identifier).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with LendingError.
pub type LendingResult<T> = Result<T, LendingError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LendingError::not_found("Book", "b-1");
        assert_eq!(err.to_string(), "Book not found: b-1");

        let err = LendingError::invalid_state("pending", "approved");
        assert_eq!(err.to_string(), "invalid state: expected pending, found approved");

        let err = LendingError::CapacityExceeded {
            book_id: "b-1".to_string(),
        };
        assert_eq!(err.to_string(), "no copies available for book b-1");
    }

    #[test]
    fn test_payment_exceeds_balance_message() {
        let err = LendingError::PaymentExceedsBalance {
            fine_id: "f-1".to_string(),
            balance_cents: 300,
            attempted_cents: 500,
        };
        assert_eq!(
            err.to_string(),
            "payment of 500 cents exceeds balance of 300 cents on fine f-1"
        );
    }

    #[test]
    fn test_validation_converts_to_lending_error() {
        let validation_err = ValidationError::Required { field: "member_id" };
        let err: LendingError = validation_err.into();
        assert!(matches!(err, LendingError::InvalidInput(_)));
        assert_eq!(err.to_string(), "invalid input: member_id is required");
    }
}
