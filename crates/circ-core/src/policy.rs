//! # Lending Policy
//!
//! The configurable lending rules, read through the engine's
//! `SettingsProvider` interface. This struct is the single shape in which
//! policy values travel; nothing in the engine hardcodes a rate or a
//! duration.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Default borrow duration in days.
pub const DEFAULT_BORROW_DURATION_DAYS: i64 = 14;

/// Default fine rate in cents per overdue day.
pub const DEFAULT_FINE_PER_DAY_CENTS: i64 = 100;

/// Default pickup window for a notified reservation, in days.
pub const DEFAULT_RESERVATION_EXPIRY_DAYS: i64 = 3;

/// Default maximum number of renewals per borrow.
pub const DEFAULT_MAX_RENEWALS: i64 = 2;

/// Default lead time for due-soon reminders, in days.
pub const DEFAULT_DUE_REMINDER_DAYS: i64 = 2;

/// Default delay before the first overdue reminder, in days.
pub const DEFAULT_OVERDUE_REMINDER_DAYS: i64 = 1;

/// The lending policy in effect.
///
/// ## Fields
/// - `borrow_duration_days`: due date = issue date + this
/// - `fine_per_day`: overdue fine rate
/// - `reservation_expiry_days`: pickup window after a reservation notify
/// - `max_renewals`: renewal ceiling carried in the policy
/// - `due_reminder_days`: due-soon reminders fire this many days early
/// - `overdue_reminder_days`: overdue reminders start this many days late
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPolicy {
    pub borrow_duration_days: i64,
    pub fine_per_day: Money,
    pub reservation_expiry_days: i64,
    pub max_renewals: i64,
    pub due_reminder_days: i64,
    pub overdue_reminder_days: i64,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        LendingPolicy {
            borrow_duration_days: DEFAULT_BORROW_DURATION_DAYS,
            fine_per_day: Money::from_cents(DEFAULT_FINE_PER_DAY_CENTS),
            reservation_expiry_days: DEFAULT_RESERVATION_EXPIRY_DAYS,
            max_renewals: DEFAULT_MAX_RENEWALS,
            due_reminder_days: DEFAULT_DUE_REMINDER_DAYS,
            overdue_reminder_days: DEFAULT_OVERDUE_REMINDER_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = LendingPolicy::default();
        assert_eq!(policy.borrow_duration_days, 14);
        assert_eq!(policy.fine_per_day.cents(), 100);
        assert_eq!(policy.reservation_expiry_days, 3);
        assert_eq!(policy.max_renewals, 2);
        assert_eq!(policy.due_reminder_days, 2);
        assert_eq!(policy.overdue_reminder_days, 1);
    }
}
