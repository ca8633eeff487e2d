//! Shared helpers for the engine's tests: in-memory databases, seeded
//! entities, and a recording notification sink.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};

use circ_core::{Book, Member};
use circ_db::{Database, DbConfig};

use crate::notify::{DeliveryError, NotificationEvent, NotificationSink};

/// Fresh in-memory database with migrations applied.
pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A member value; not yet persisted.
pub fn member(id: &str, active: bool) -> Member {
    Member {
        id: id.to_string(),
        name: format!("Member {id}"),
        email: format!("{id}@example.com"),
        contact: Some("555-0100".to_string()),
        active,
        created_at: Utc::now(),
    }
}

/// A book value; not yet persisted.
pub fn book(id: &str, total: i64, available: i64) -> Book {
    let now = Utc::now();
    Book {
        id: id.to_string(),
        title: format!("Book {id}"),
        author: "A. Author".to_string(),
        category: "fiction".to_string(),
        isbn: None,
        total_copies: total,
        copies_available: available,
        created_at: now,
        updated_at: now,
    }
}

/// Inserts a member and returns it.
pub async fn seed_member(db: &Database, id: &str, active: bool) -> Member {
    let m = member(id, active);
    db.members().insert(&m).await.unwrap();
    m
}

/// Inserts a book and returns it.
pub async fn seed_book(db: &Database, id: &str, total: i64, available: i64) -> Book {
    let b = book(id, total, available);
    db.books().insert(&b).await.unwrap();
    b
}

/// Sink that records every delivered event; optionally fails every
/// delivery.
pub struct RecordingSink {
    pub delivered: Arc<Mutex<Vec<NotificationEvent>>>,
    pub fail: bool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError("recording sink set to fail".to_string()));
        }
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Builds a recording sink and a handle to what it delivered.
pub fn recording_sink(
    fail: bool,
) -> (Arc<dyn NotificationSink>, Arc<Mutex<Vec<NotificationEvent>>>) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(RecordingSink {
        delivered: delivered.clone(),
        fail,
    });
    (sink, delivered)
}
