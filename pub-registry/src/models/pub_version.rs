//! Package versions. The semantic version components are fixed at insert time;
//! re-uploads only replace the manifest, readme, changelog and uploader.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PubVersion {
    pub package_name: String,
    pub version: String,
    pub version_number_major: i64,
    pub version_number_minor: i64,
    pub version_number_patch: i64,
    pub prerelease: bool,
    pub pubspec: serde_json::Value,
    #[serde(rename = "user_id")]
    pub uploader_id: Option<Uuid>,
    pub readme: Option<String>,
    pub changelog: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row shape for the version search listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PubVersionSummary {
    pub package_name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by an upload. Built from a parsed archive.
#[derive(Debug, Clone)]
pub struct NewPubVersion {
    pub package_name: String,
    pub version: String,
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    pub prerelease: bool,
    pub pubspec: serde_json::Value,
    pub uploader_id: Option<Uuid>,
    pub readme: Option<String>,
    pub changelog: Option<String>,
}
