use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    handlers::pub_api::pub_error, middleware::auth::bearer_token, models::PubToken,
    services::Visibility, AppState,
};

/// Pub client authenticated with a pub token.
#[derive(Debug, Clone)]
pub struct PubTokenAuth {
    pub token_id: Uuid,
    pub user_id: Option<Uuid>,
    pub read: bool,
    pub write: bool,
}

impl From<PubToken> for PubTokenAuth {
    fn from(token: PubToken) -> Self {
        Self {
            token_id: token.id,
            user_id: token.user_id,
            read: token.read,
            write: token.write,
        }
    }
}

/// Takes the bearer by value so no borrow of the request lives across the lookup.
async fn resolve(state: &AppState, bearer: Option<String>) -> Option<PubTokenAuth> {
    let bearer = bearer?;
    match state.pub_tokens.authenticate(&bearer).await {
        Ok(token) => Some(token.into()),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring pub token");
            None
        }
    }
}

/// Attach the pub token when a valid one is presented; anonymous otherwise.
pub async fn optional_pub_token_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = bearer_token(req.headers()).map(str::to_owned);
    if let Some(auth) = resolve(&state, bearer).await {
        tracing::Span::current().record("token_id", tracing::field::display(auth.token_id));
        req.extensions_mut().insert(auth);
    }
    next.run(req).await
}

/// Require a live pub token with the write flag.
pub async fn write_pub_token_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = bearer_token(req.headers()).map(str::to_owned);
    match resolve(&state, bearer).await {
        Some(auth) if auth.write => {
            tracing::Span::current().record("token_id", tracing::field::display(auth.token_id));
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        _ => pub_error(StatusCode::UNAUTHORIZED, "Unauthenticated"),
    }
}

/// Visibility granted by the request's pub token, if any.
pub struct PubAccess(pub Option<PubTokenAuth>);

impl PubAccess {
    pub fn visibility(&self) -> Visibility {
        match &self.0 {
            Some(auth) if auth.read => Visibility::All,
            _ => Visibility::PublicOnly,
        }
    }

    pub fn uploader_id(&self) -> Option<Uuid> {
        self.0.as_ref().and_then(|auth| auth.user_id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for PubAccess
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PubAccess(parts.extensions.get::<PubTokenAuth>().cloned()))
    }
}
