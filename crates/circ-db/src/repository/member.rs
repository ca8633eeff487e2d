//! # Member Repository
//!
//! Database operations for members. Registration and authentication live
//! outside this system; the engine only needs lookup and the active flag.

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use circ_core::Member;

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, email, contact, active, created_at
    FROM members
"#;

/// Repository for member database operations.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    /// Creates a new MemberRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MemberRepository { pool }
    }

    /// Gets a member by their ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Member>> {
        self.get_in(&self.pool, id).await
    }

    /// Gets a member by their ID on the given executor.
    pub async fn get_in(&self, ex: impl SqliteExecutor<'_>, id: &str) -> DbResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(ex)
            .await?;

        Ok(member)
    }

    /// Inserts a new member.
    pub async fn insert(&self, member: &Member) -> DbResult<()> {
        debug!(id = %member.id, email = %member.email, "inserting member");

        sqlx::query(
            r#"
            INSERT INTO members (id, name, email, contact, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.contact)
        .bind(member.active)
        .bind(member.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets the active flag.
    ///
    /// ## Returns
    /// `rows_affected`: 0 means the member is missing.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<u64> {
        debug!(id = %id, active, "setting member active flag");

        let result = sqlx::query("UPDATE members SET active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Lists all members, by name.
    pub async fn all(&self) -> DbResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(&format!("{SELECT_COLUMNS} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(members)
    }

    /// Lists active members, by name.
    pub async fn active(&self) -> DbResult<Vec<Member>> {
        let members =
            sqlx::query_as::<_, Member>(&format!("{SELECT_COLUMNS} WHERE active = 1 ORDER BY name"))
                .fetch_all(&self.pool)
                .await?;

        Ok(members)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use chrono::Utc;
    use circ_core::Member;

    fn member(email: &str) -> Member {
        Member {
            id: generate_id(),
            name: "Pat Reader".to_string(),
            email: email.to_string(),
            contact: Some("555-0100".to_string()),
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.members();

        let m = member("pat@example.com");
        repo.insert(&m).await.unwrap();

        let found = repo.get(&m.id).await.unwrap().unwrap();
        assert!(found.active);

        assert_eq!(repo.set_active(&m.id, false).await.unwrap(), 1);
        let found = repo.get(&m.id).await.unwrap().unwrap();
        assert!(!found.active);

        assert!(repo.active().await.unwrap().is_empty());
        assert_eq!(repo.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.members();

        repo.insert(&member("same@example.com")).await.unwrap();
        let err = repo.insert(&member("same@example.com")).await.unwrap_err();
        assert!(matches!(err, crate::error::DbError::UniqueViolation { .. }));
    }
}
