use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use service_core::{error::AppError, response};
use uuid::Uuid;

use crate::{
    dtos::{
        pub_token::{CreatePubTokenRequest, UpdatePubTokenRequest},
        ListQuery,
    },
    handlers::page_response,
    middleware::AuthUser,
    utils::{ValidatedJson, ValidatedQuery},
    AppState,
};

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreatePubTokenRequest>,
) -> Result<Response, AppError> {
    let created = state.pub_tokens.create(user.user_id, req).await?;
    Ok(response::success(StatusCode::CREATED, created))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Response, AppError> {
    let page = state.pub_tokens.list(user.user_id, &query).await?;
    Ok(page_response(query.page(), query.limit(), page))
}

pub async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let token = state.pub_tokens.detail(id, user.user_id).await?;
    Ok(response::detail(StatusCode::OK, token))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePubTokenRequest>,
) -> Result<Response, AppError> {
    let token = state.pub_tokens.update(id, user.user_id, req).await?;
    Ok(response::detail(StatusCode::OK, token))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.pub_tokens.delete(id, user.user_id).await?;
    Ok(response::detail(StatusCode::OK, serde_json::Value::Null))
}
