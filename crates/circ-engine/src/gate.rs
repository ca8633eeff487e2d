//! # Lending Gate
//!
//! The single authority for the "may this member borrow this book" rule.
//! Both the admin approval surface and the self-service borrow path consult
//! this component; the rule lives nowhere else.
//!
//! A member may not borrow when:
//! - they don't exist or are inactive
//! - they have outstanding (unpaid or partially-paid) fines
//! - they already hold an unreturned approved record for the same book

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use circ_core::{LendingError, LendingResult, Money};
use circ_db::Database;

use crate::members::MemberDirectory;

/// A single violated gate rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateViolation {
    MemberNotFound,
    MemberInactive,
    OutstandingFines { total: Money },
    AlreadyBorrowed { book_id: String },
}

impl fmt::Display for GateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateViolation::MemberNotFound => write!(f, "member not found"),
            GateViolation::MemberInactive => write!(f, "member account is inactive"),
            GateViolation::OutstandingFines { total } => {
                write!(f, "member has outstanding fines of {total}")
            }
            GateViolation::AlreadyBorrowed { book_id } => {
                write!(f, "member already has book {book_id} on loan")
            }
        }
    }
}

/// The gate's verdict with every violated rule listed.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub violations: Vec<GateViolation>,
}

impl GateDecision {
    /// True when no rule was violated.
    pub fn allowed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Joined human-readable reason, for error messages.
    pub fn reason(&self) -> String {
        self.violations
            .iter()
            .map(|violation| violation.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Cross-cutting borrow admission check.
#[derive(Clone)]
pub struct LendingGate {
    db: Database,
    directory: Arc<dyn MemberDirectory>,
}

impl LendingGate {
    pub fn new(db: Database, directory: Arc<dyn MemberDirectory>) -> Self {
        LendingGate { db, directory }
    }

    /// Evaluates every rule and returns the full verdict.
    pub async fn check(&self, member_id: &str, book_id: &str) -> LendingResult<GateDecision> {
        let mut violations = Vec::new();

        match self.directory.find(member_id).await? {
            None => violations.push(GateViolation::MemberNotFound),
            Some(member) if !member.active => violations.push(GateViolation::MemberInactive),
            Some(_) => {}
        }

        let outstanding = self
            .db
            .fines()
            .outstanding_total(self.db.pool(), member_id)
            .await?;
        if outstanding > 0 {
            violations.push(GateViolation::OutstandingFines {
                total: Money::from_cents(outstanding),
            });
        }

        if self
            .db
            .borrows()
            .has_active_borrow(self.db.pool(), member_id, book_id)
            .await?
        {
            violations.push(GateViolation::AlreadyBorrowed {
                book_id: book_id.to_string(),
            });
        }

        debug!(
            member_id = %member_id,
            book_id = %book_id,
            violations = violations.len(),
            "lending gate checked"
        );

        Ok(GateDecision { violations })
    }

    /// Boolean form of [`LendingGate::check`].
    pub async fn can_borrow(&self, member_id: &str, book_id: &str) -> LendingResult<bool> {
        Ok(self.check(member_id, book_id).await?.allowed())
    }

    /// Returns `BusinessRuleViolation` with the joined reasons when any
    /// rule is violated.
    pub async fn enforce(&self, member_id: &str, book_id: &str) -> LendingResult<()> {
        let decision = self.check(member_id, book_id).await?;
        if decision.allowed() {
            Ok(())
        } else {
            Err(LendingError::rule(decision.reason()))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
