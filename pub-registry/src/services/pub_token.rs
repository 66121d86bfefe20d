use chrono::Utc;
use uuid::Uuid;

use crate::{
    dtos::{
        pub_token::{CreatePubTokenRequest, CreatePubTokenResponse, UpdatePubTokenRequest},
        ListQuery,
    },
    models::PubToken,
    services::{database::Page, Database, JwtService, ServiceError},
};

#[derive(Clone)]
pub struct PubTokenService {
    db: Database,
    jwt: JwtService,
}

impl PubTokenService {
    pub fn new(db: Database, jwt: JwtService) -> Self {
        Self { db, jwt }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        req: CreatePubTokenRequest,
    ) -> Result<CreatePubTokenResponse, ServiceError> {
        let expires_at = req.expires_at().ok_or_else(|| {
            ServiceError::InvalidRequest("Expired at must be a date formatted YYYY-MM-DD".into())
        })?;
        if expires_at <= Utc::now() {
            return Err(ServiceError::InvalidRequest(
                "Expired at must be in the future".to_string(),
            ));
        }

        let owner = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let write = req.write.unwrap_or(false);
        if write && !owner.can_write {
            return Err(ServiceError::InvalidRequest(
                "User is not allowed to create write tokens".to_string(),
            ));
        }

        let token = PubToken::new(
            owner.id,
            req.remarks,
            req.read.unwrap_or(true),
            write,
            expires_at,
        );
        let stored = self.db.insert_pub_token(&token).await?;
        let jwt = self
            .jwt
            .generate_pub_token(stored.id, stored.expired_at)
            .map_err(ServiceError::Internal)?;

        tracing::info!(token_id = %stored.id, user_id = %owner.id, write, "Pub token created");

        Ok(CreatePubTokenResponse {
            token: jwt,
            detail: stored,
        })
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<Page<PubToken>, ServiceError> {
        Ok(self
            .db
            .list_pub_tokens(user_id, query.search(), query.page(), query.limit())
            .await?)
    }

    pub async fn detail(&self, id: Uuid, user_id: Uuid) -> Result<PubToken, ServiceError> {
        self.db
            .find_pub_token(id, user_id)
            .await?
            .ok_or(ServiceError::PubTokenNotFound)
    }

    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: UpdatePubTokenRequest,
    ) -> Result<PubToken, ServiceError> {
        if req.write == Some(true) {
            let owner = self
                .db
                .find_user_by_id(user_id)
                .await?
                .ok_or(ServiceError::UserNotFound)?;
            if !owner.can_write {
                return Err(ServiceError::InvalidRequest(
                    "User is not allowed to create write tokens".to_string(),
                ));
            }
        }

        self.db
            .update_pub_token(id, user_id, req.remarks.as_deref(), req.read, req.write)
            .await?
            .ok_or(ServiceError::PubTokenNotFound)
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.db.delete_pub_token(id, user_id).await? {
            return Err(ServiceError::PubTokenNotFound);
        }
        tracing::info!(token_id = %id, user_id = %user_id, "Pub token deleted");
        Ok(())
    }

    /// Resolve a bearer pub token to its live row.
    pub async fn authenticate(&self, bearer: &str) -> Result<PubToken, ServiceError> {
        let claims = self
            .jwt
            .validate_pub_token(bearer)
            .map_err(|e| ServiceError::Token(e.to_string()))?;
        let id = claims
            .subject_id()
            .map_err(|e| ServiceError::Token(e.to_string()))?;

        let token = self
            .db
            .find_active_pub_token(id)
            .await?
            .ok_or_else(|| ServiceError::Token("unknown pub token".to_string()))?;

        if token.is_expired() {
            return Err(ServiceError::Token("pub token expired".to_string()));
        }

        Ok(token)
    }
}
