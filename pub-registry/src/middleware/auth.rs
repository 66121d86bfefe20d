use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{services::Claims, AppState};

/// Authenticated user, taken from a validated user JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims.subject_id().map_err(|_| unauthenticated())?;
        Ok(Self {
            user_id,
            is_admin: claims.is_admin(),
        })
    }
}

pub fn unauthenticated() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("Unauthenticated"))
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Require a user access token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or_else(unauthenticated)?;
    let claims = state.jwt.validate_access_token(token)?;
    let user = AuthUser::try_from(claims)?;

    tracing::Span::current().record("user_id", tracing::field::display(user.user_id));
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Require a user refresh token.
pub async fn refresh_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or_else(unauthenticated)?;
    let claims = state.jwt.validate_refresh_token(token)?;
    req.extensions_mut().insert(AuthUser::try_from(claims)?);

    Ok(next.run(req).await)
}

/// Attach the user when a valid access token is present; anonymous otherwise.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = bearer_token(req.headers())
        .and_then(|token| state.jwt.validate_access_token(token).ok())
        .and_then(|claims| AuthUser::try_from(claims).ok());

    if let Some(user) = user {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}

/// Require the `is_admin` claim. Must run after `auth_middleware`.
pub async fn admin_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin => Ok(next.run(req).await),
        Some(user) => {
            tracing::warn!(user_id = %user.user_id, "Rejected non-admin request");
            Err(unauthenticated())
        }
        None => Err(unauthenticated()),
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(unauthenticated)
    }
}

/// The user if one was authenticated by `optional_auth_middleware`.
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
