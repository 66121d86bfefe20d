//! One-time password issued for account recovery.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// OTP purpose codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Forgot,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Forgot => "forgot",
        }
    }
}

/// OTP entity, one row per user and purpose. `otp` holds the hash, never the code.
#[derive(Debug, Clone, FromRow)]
pub struct UserOtp {
    pub user_id: Uuid,
    pub purpose: String,
    pub otp: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserOtp {
    pub fn is_expired(&self) -> bool {
        self.expired_at <= Utc::now()
    }
}
