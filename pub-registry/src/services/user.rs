use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::{
        user::{
            CreateUserRequest, ForgotCreatePasswordRequest, ForgotOtpResponse, LoginRequest,
            UpdateUserRequest,
        },
        ListQuery,
    },
    models::{OtpPurpose, User, UserResponse},
    services::{database::Page, Database, EmailProvider, JwtService, ServiceError, TokenResponse},
    utils::{generate_otp, hash_secret, secret_matches, Secret},
};

pub const OTP_LENGTH: usize = 6;

pub const SEED_ADMIN_ID: &str = "6d9b7354-b127-46dc-bcae-ff289c2bdcac";
pub const SEED_ADMIN_NAME: &str = "Admin";
pub const SEED_ADMIN_EMAIL: &str = "admin@m8zn.work";
pub const SEED_ADMIN_PASSWORD: &str = "Password";

#[derive(Clone)]
pub struct UserService {
    db: Database,
    jwt: JwtService,
    email: Arc<dyn EmailProvider>,
    otp_expiry_minutes: i64,
}

fn hash(secret: &str) -> Result<String, ServiceError> {
    hash_secret(&Secret::new(secret)).map_err(ServiceError::Internal)
}

fn matches_hash(secret: &str, stored: &str) -> bool {
    secret_matches(&Secret::new(secret), stored)
}

fn unique_email_violation(err: sqlx::Error) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::EmailAlreadyRegistered
        }
        _ => ServiceError::Database(err),
    }
}

impl UserService {
    pub fn new(
        db: Database,
        jwt: JwtService,
        email: Arc<dyn EmailProvider>,
        otp_expiry_minutes: i64,
    ) -> Self {
        Self {
            db,
            jwt,
            email,
            otp_expiry_minutes,
        }
    }

    fn issue_tokens(&self, user: &User) -> Result<TokenResponse, ServiceError> {
        self.jwt
            .generate_token_pair(user.id, user.is_admin)
            .map_err(ServiceError::Internal)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse, ServiceError> {
        let user = self
            .db
            .find_user_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !matches_hash(&req.password, &user.password) {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.issue_tokens(&user)
    }

    /// New token pair for the subject of a valid refresh token.
    pub async fn refresh(&self, user_id: Uuid) -> Result<TokenResponse, ServiceError> {
        let user = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::Token("user no longer exists".to_string()))?;

        self.issue_tokens(&user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let user = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let mut profile = user.sanitized();
        profile.created_at = None;
        Ok(profile)
    }

    /// Email a fresh OTP; only its hash is stored and the code is never returned.
    pub async fn forgot_otp(&self, email: &str) -> Result<ForgotOtpResponse, ServiceError> {
        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let otp = generate_otp(OTP_LENGTH);
        let expired_at = Utc::now() + Duration::minutes(self.otp_expiry_minutes);

        self.db
            .upsert_otp(user.id, OtpPurpose::Forgot, &hash(&otp)?, expired_at)
            .await?;

        self.email
            .send_forgot_otp(&user.email, &otp, self.otp_expiry_minutes)
            .await
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        tracing::info!(user_id = %user.id, "Forgot password OTP issued");

        Ok(ForgotOtpResponse {
            email: user.email,
            expiry_minutes: self.otp_expiry_minutes,
        })
    }

    pub async fn forgot_create_password(
        &self,
        req: ForgotCreatePasswordRequest,
    ) -> Result<(), ServiceError> {
        let user = self
            .db
            .find_user_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidOtp)?;

        let otp = self
            .db
            .find_otp(user.id, OtpPurpose::Forgot)
            .await?
            .ok_or(ServiceError::InvalidOtp)?;

        if otp.is_expired() || !matches_hash(&req.otp, &otp.otp) {
            tracing::warn!(user_id = %user.id, "Rejected password reset OTP");
            return Err(ServiceError::InvalidOtp);
        }

        self.db
            .reset_password(user.id, &hash(&req.password)?, OtpPurpose::Forgot)
            .await?;

        Ok(())
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        if self.db.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let mut user = User::new(req.name, req.email, hash(&req.password)?);
        user.is_admin = req.is_admin;
        user.can_write = req.can_write;

        let created = self
            .db
            .insert_user(&user)
            .await
            .map_err(unique_email_violation)?;

        Ok(created.sanitized())
    }

    pub async fn list_users(&self, query: &ListQuery) -> Result<Page<UserResponse>, ServiceError> {
        let page = self
            .db
            .list_users(query.search(), query.page(), query.limit())
            .await?;

        Ok(Page {
            rows: page.rows.into_iter().map(UserResponse::from).collect(),
            total: page.total,
        })
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserResponse, ServiceError> {
        self.db
            .find_user_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        if let Some(email) = &req.email {
            if let Some(existing) = self.db.find_user_by_email(email).await? {
                if existing.id != id {
                    return Err(ServiceError::EmailAlreadyRegistered);
                }
            }
        }

        let user = self
            .db
            .update_user(
                id,
                req.name.as_deref(),
                req.email.as_deref(),
                req.is_admin,
                req.can_write,
            )
            .await
            .map_err(unique_email_violation)?
            .ok_or(ServiceError::UserNotFound)?;

        tracing::info!(user_id = %user.id, "User updated");
        Ok(user.sanitized())
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.db.soft_delete_user(id).await? {
            return Err(ServiceError::UserNotFound);
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Create the bootstrap administrator when it does not exist yet.
    pub async fn seed_admin(&self) -> Result<bool, ServiceError> {
        let id = Uuid::parse_str(SEED_ADMIN_ID)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        let mut admin = User::new(
            SEED_ADMIN_NAME.to_string(),
            SEED_ADMIN_EMAIL.to_string(),
            hash(SEED_ADMIN_PASSWORD)?,
        );
        admin.id = id;
        admin.is_admin = true;
        admin.can_write = true;

        let created = self.db.insert_user_if_absent(&admin).await?;
        if created {
            tracing::info!(user_id = %id, email = SEED_ADMIN_EMAIL, "Seeded bootstrap administrator");
        }
        Ok(created)
    }
}
