//! Pub token model - scoped API credentials for the pub client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Pub token entity. `user_id` is nulled when the owning user row goes away.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PubToken {
    pub id: Uuid,
    pub remarks: String,
    pub read: bool,
    pub write: bool,
    pub expired_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PubToken {
    pub fn new(
        user_id: Uuid,
        remarks: String,
        read: bool,
        write: bool,
        expired_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            remarks,
            read,
            write,
            expired_at,
            user_id: Some(user_id),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired_at <= Utc::now()
    }
}
