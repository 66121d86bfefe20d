use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

pub const USER_ISSUER: &str = "appUser";
pub const PUB_TOKEN_ISSUER: &str = "pubToken";
pub const ACCESS_AUDIENCE: &str = "app";
pub const REFRESH_AUDIENCE: &str = "token_refresh";

/// JWT service for user sessions and pub tokens (HS256, shared secret)
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_lifetime_minutes: i64,
    refresh_lifetime_minutes: i64,
}

/// Claims carried by every token this service issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID or pub token ID)
    pub sub: String,
    pub iss: String,
    pub aud: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl Claims {
    pub fn subject_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.sub)
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin.unwrap_or(false)
    }
}

/// Token pair returned on login and refresh
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        tracing::info!("JWT service initialized with HS256 secret");

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            token_lifetime_minutes: config.token_lifetime_minutes,
            refresh_lifetime_minutes: config.refresh_lifetime_minutes,
        }
    }

    fn sign(
        &self,
        subject: &str,
        issuer: &str,
        audience: &str,
        expires_at: DateTime<Utc>,
        is_admin: Option<bool>,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            aud: vec![audience.to_string()],
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            is_admin,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    fn verify(
        &self,
        token: &str,
        issuer: &str,
        audience: &str,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Generate the access and refresh tokens for a user
    pub fn generate_token_pair(
        &self,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<TokenResponse, anyhow::Error> {
        let now = Utc::now();
        let subject = user_id.to_string();

        let access_token = self.sign(
            &subject,
            USER_ISSUER,
            ACCESS_AUDIENCE,
            now + Duration::minutes(self.token_lifetime_minutes),
            Some(is_admin),
        )?;
        let refresh_token = self.sign(
            &subject,
            USER_ISSUER,
            REFRESH_AUDIENCE,
            now + Duration::minutes(self.refresh_lifetime_minutes),
            Some(is_admin),
        )?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
        })
    }

    /// Generate the bearer token handed out for a pub token row
    pub fn generate_pub_token(
        &self,
        token_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        self.sign(
            &token_id.to_string(),
            PUB_TOKEN_ISSUER,
            ACCESS_AUDIENCE,
            expires_at,
            None,
        )
    }

    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        self.verify(token, USER_ISSUER, ACCESS_AUDIENCE)
    }

    pub fn validate_refresh_token(
        &self,
        token: &str,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        self.verify(token, USER_ISSUER, REFRESH_AUDIENCE)
    }

    pub fn validate_pub_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        self.verify(token, PUB_TOKEN_ISSUER, ACCESS_AUDIENCE)
    }
}
