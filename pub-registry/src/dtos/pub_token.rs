use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::PubToken;

pub const EXPIRY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePubTokenRequest {
    #[validate(length(min = 1, message = "Remarks is required"))]
    pub remarks: String,

    #[validate(required(message = "Read is required"))]
    pub read: Option<bool>,

    #[validate(required(message = "Write is required"))]
    pub write: Option<bool>,

    #[validate(custom(function = "validate_expiry_date"))]
    pub expired_at: String,
}

impl CreatePubTokenRequest {
    /// Midnight UTC of the requested expiry date.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        parse_expiry_date(&self.expired_at)
    }
}

pub fn parse_expiry_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), EXPIRY_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn validate_expiry_date(value: &str) -> Result<(), ValidationError> {
    if parse_expiry_date(value).is_some() {
        Ok(())
    } else {
        let mut err = ValidationError::new("date");
        err.message = Some("Expired at must be a date formatted YYYY-MM-DD".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePubTokenRequest {
    #[validate(length(min = 1, message = "Remarks must not be empty"))]
    pub remarks: Option<String>,

    pub read: Option<bool>,

    pub write: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CreatePubTokenResponse {
    pub token: String,
    pub detail: PubToken,
}
