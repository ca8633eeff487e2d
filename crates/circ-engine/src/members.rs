//! # Member Directory
//!
//! Read-only member lookup for the engine. Member administration
//! (registration, authentication, profile edits) lives outside the lending
//! core; the engine only needs identity and the active flag.

use async_trait::async_trait;

use circ_core::{LendingResult, Member};
use circ_db::Database;

/// Lookup access to members.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Finds a member by ID.
    async fn find(&self, member_id: &str) -> LendingResult<Option<Member>>;

    /// Whether the member exists and is active.
    async fn is_active(&self, member_id: &str) -> LendingResult<bool> {
        Ok(self
            .find(member_id)
            .await?
            .map(|member| member.active)
            .unwrap_or(false))
    }
}

/// Member directory backed by the members table.
#[derive(Debug, Clone)]
pub struct DbMemberDirectory {
    db: Database,
}

impl DbMemberDirectory {
    pub fn new(db: Database) -> Self {
        DbMemberDirectory { db }
    }
}

#[async_trait]
impl MemberDirectory for DbMemberDirectory {
    async fn find(&self, member_id: &str) -> LendingResult<Option<Member>> {
        Ok(self.db.members().get(member_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
