use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A package in the catalog. Created private on first upload.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PubPackage {
    pub name: String,
    pub private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}
