//! # Settings Provider
//!
//! The engine's single source of truth for lending policy.
//!
//! Every rate and duration the engine uses comes through this interface:
//! borrow duration, the fine rate, the reservation pickup window, and the
//! reminder lead times. Nothing downstream carries a hardcoded value.

use async_trait::async_trait;
use std::sync::Arc;

use circ_core::{LendingPolicy, LendingResult};
use circ_db::Database;

/// Read access to the lending policy.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Returns the policy currently in effect.
    async fn policy(&self) -> LendingResult<LendingPolicy>;
}

/// Settings provider backed by the database settings row.
///
/// Reads on every call so a policy update takes effect immediately; the
/// settings row is created with defaults on first use.
#[derive(Debug, Clone)]
pub struct DbSettingsProvider {
    db: Database,
}

impl DbSettingsProvider {
    pub fn new(db: Database) -> Self {
        DbSettingsProvider { db }
    }
}

#[async_trait]
impl SettingsProvider for DbSettingsProvider {
    async fn policy(&self) -> LendingResult<LendingPolicy> {
        let settings = self.db.settings().get_or_create().await?;
        Ok(settings.policy())
    }
}

/// Fixed-policy provider for tests and tools.
#[derive(Debug, Clone)]
pub struct StaticSettings(pub LendingPolicy);

impl StaticSettings {
    /// The default policy as an `Arc<dyn SettingsProvider>`.
    pub fn shared_default() -> Arc<dyn SettingsProvider> {
        Arc::new(StaticSettings(LendingPolicy::default()))
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn policy(&self) -> LendingResult<LendingPolicy> {
        Ok(self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use circ_db::{DbConfig, SettingsUpdate};

    #[tokio::test]
    async fn test_db_provider_reflects_updates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let provider = DbSettingsProvider::new(db.clone());

        let policy = provider.policy().await.unwrap();
        assert_eq!(policy.fine_per_day.cents(), 100);

        db.settings()
            .update(SettingsUpdate {
                fine_per_day_cents: Some(250),
                ..Default::default()
            })
            .await
            .unwrap();

        let policy = provider.policy().await.unwrap();
        assert_eq!(policy.fine_per_day.cents(), 250);
    }
}
