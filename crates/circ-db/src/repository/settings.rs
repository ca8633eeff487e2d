//! # Settings Repository
//!
//! The single-row lending policy store.
//!
//! The engine reads policy exclusively through its `SettingsProvider`
//! interface, which is backed by this repository. Nothing else in the
//! system carries a rate or a duration.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::generate_id;
use circ_core::policy::{
    DEFAULT_BORROW_DURATION_DAYS, DEFAULT_DUE_REMINDER_DAYS, DEFAULT_FINE_PER_DAY_CENTS,
    DEFAULT_MAX_RENEWALS, DEFAULT_OVERDUE_REMINDER_DAYS, DEFAULT_RESERVATION_EXPIRY_DAYS,
};
use circ_core::{LendingPolicy, Money};

/// The persisted settings row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSettings {
    pub id: String,
    pub borrow_duration_days: i64,
    pub fine_per_day_cents: i64,
    pub reservation_expiry_days: i64,
    pub max_renewals: i64,
    pub due_reminder_days: i64,
    pub overdue_reminder_days: i64,
    pub library_name: String,
    pub updated_at: DateTime<Utc>,
}

impl StoredSettings {
    /// The policy view the engine consumes.
    pub fn policy(&self) -> LendingPolicy {
        LendingPolicy {
            borrow_duration_days: self.borrow_duration_days,
            fine_per_day: Money::from_cents(self.fine_per_day_cents),
            reservation_expiry_days: self.reservation_expiry_days,
            max_renewals: self.max_renewals,
            due_reminder_days: self.due_reminder_days,
            overdue_reminder_days: self.overdue_reminder_days,
        }
    }
}

/// A partial settings update; None fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub borrow_duration_days: Option<i64>,
    pub fine_per_day_cents: Option<i64>,
    pub reservation_expiry_days: Option<i64>,
    pub max_renewals: Option<i64>,
    pub due_reminder_days: Option<i64>,
    pub overdue_reminder_days: Option<i64>,
    pub library_name: Option<String>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, borrow_duration_days, fine_per_day_cents,
           reservation_expiry_days, max_renewals,
           due_reminder_days, overdue_reminder_days,
           library_name, updated_at
    FROM settings
"#;

/// Repository for the settings row.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Gets the settings row, creating it with defaults on first use.
    pub async fn get_or_create(&self) -> DbResult<StoredSettings> {
        if let Some(settings) =
            sqlx::query_as::<_, StoredSettings>(&format!("{SELECT_COLUMNS} LIMIT 1"))
                .fetch_optional(&self.pool)
                .await?
        {
            return Ok(settings);
        }

        info!("no settings row found, creating defaults");

        let settings = StoredSettings {
            id: generate_id(),
            borrow_duration_days: DEFAULT_BORROW_DURATION_DAYS,
            fine_per_day_cents: DEFAULT_FINE_PER_DAY_CENTS,
            reservation_expiry_days: DEFAULT_RESERVATION_EXPIRY_DAYS,
            max_renewals: DEFAULT_MAX_RENEWALS,
            due_reminder_days: DEFAULT_DUE_REMINDER_DAYS,
            overdue_reminder_days: DEFAULT_OVERDUE_REMINDER_DAYS,
            library_name: "Circulate Library".to_string(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO settings (
                id, borrow_duration_days, fine_per_day_cents,
                reservation_expiry_days, max_renewals,
                due_reminder_days, overdue_reminder_days,
                library_name, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&settings.id)
        .bind(settings.borrow_duration_days)
        .bind(settings.fine_per_day_cents)
        .bind(settings.reservation_expiry_days)
        .bind(settings.max_renewals)
        .bind(settings.due_reminder_days)
        .bind(settings.overdue_reminder_days)
        .bind(&settings.library_name)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Applies a partial update; untouched fields keep their values.
    pub async fn update(&self, update: SettingsUpdate) -> DbResult<StoredSettings> {
        let current = self.get_or_create().await?;

        debug!(id = %current.id, "updating settings");

        let merged = StoredSettings {
            id: current.id.clone(),
            borrow_duration_days: update
                .borrow_duration_days
                .unwrap_or(current.borrow_duration_days),
            fine_per_day_cents: update
                .fine_per_day_cents
                .unwrap_or(current.fine_per_day_cents),
            reservation_expiry_days: update
                .reservation_expiry_days
                .unwrap_or(current.reservation_expiry_days),
            max_renewals: update.max_renewals.unwrap_or(current.max_renewals),
            due_reminder_days: update.due_reminder_days.unwrap_or(current.due_reminder_days),
            overdue_reminder_days: update
                .overdue_reminder_days
                .unwrap_or(current.overdue_reminder_days),
            library_name: update.library_name.unwrap_or(current.library_name),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            UPDATE settings SET
                borrow_duration_days = ?2,
                fine_per_day_cents = ?3,
                reservation_expiry_days = ?4,
                max_renewals = ?5,
                due_reminder_days = ?6,
                overdue_reminder_days = ?7,
                library_name = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&merged.id)
        .bind(merged.borrow_duration_days)
        .bind(merged.fine_per_day_cents)
        .bind(merged.reservation_expiry_days)
        .bind(merged.max_renewals)
        .bind(merged.due_reminder_days)
        .bind(merged.overdue_reminder_days)
        .bind(&merged.library_name)
        .bind(merged.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(merged)
    }

    /// Resets every policy value to its default.
    pub async fn reset_to_defaults(&self) -> DbResult<StoredSettings> {
        self.update(SettingsUpdate {
            borrow_duration_days: Some(DEFAULT_BORROW_DURATION_DAYS),
            fine_per_day_cents: Some(DEFAULT_FINE_PER_DAY_CENTS),
            reservation_expiry_days: Some(DEFAULT_RESERVATION_EXPIRY_DAYS),
            max_renewals: Some(DEFAULT_MAX_RENEWALS),
            due_reminder_days: Some(DEFAULT_DUE_REMINDER_DAYS),
            overdue_reminder_days: Some(DEFAULT_OVERDUE_REMINDER_DAYS),
            library_name: None,
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_get_or_create_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let settings = repo.get_or_create().await.unwrap();
        assert_eq!(settings.borrow_duration_days, 14);
        assert_eq!(settings.fine_per_day_cents, 100);
        assert_eq!(settings.reservation_expiry_days, 3);
        assert_eq!(settings.max_renewals, 2);

        // Second call returns the same row
        let again = repo.get_or_create().await.unwrap();
        assert_eq!(again.id, settings.id);
    }

    #[tokio::test]
    async fn test_partial_update_and_reset() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let updated = repo
            .update(SettingsUpdate {
                fine_per_day_cents: Some(250),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.fine_per_day_cents, 250);
        // Untouched fields keep their values
        assert_eq!(updated.borrow_duration_days, 14);

        let reset = repo.reset_to_defaults().await.unwrap();
        assert_eq!(reset.fine_per_day_cents, 100);
    }

    #[tokio::test]
    async fn test_policy_view() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings().get_or_create().await.unwrap();
        let policy = settings.policy();
        assert_eq!(policy.fine_per_day.cents(), 100);
        assert_eq!(policy.borrow_duration_days, 14);
    }
}
