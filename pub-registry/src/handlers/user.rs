//! User handlers: session tokens, password recovery and admin management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use service_core::{error::AppError, response};
use uuid::Uuid;

use crate::{
    dtos::{
        user::{
            CreateUserRequest, ForgotCreatePasswordRequest, ForgotOtpRequest, LoginRequest,
            UpdateUserRequest,
        },
        ListQuery,
    },
    handlers::page_response,
    middleware::AuthUser,
    utils::{ValidatedJson, ValidatedQuery},
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let tokens = state.users.login(req).await?;
    Ok(response::success(StatusCode::OK, tokens))
}

pub async fn refresh(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let tokens = state.users.refresh(user.user_id).await?;
    Ok(response::success(StatusCode::OK, tokens))
}

pub async fn profile(State(state): State<AppState>, user: AuthUser) -> Result<Response, AppError> {
    let profile = state.users.profile(user.user_id).await?;
    Ok(response::detail(StatusCode::OK, profile))
}

pub async fn forgot_password_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotOtpRequest>,
) -> Result<Response, AppError> {
    let sent = state.users.forgot_otp(&req.email).await?;
    Ok(response::detail(StatusCode::OK, sent))
}

pub async fn forgot_password_create(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotCreatePasswordRequest>,
) -> Result<Response, AppError> {
    state.users.forgot_create_password(req).await?;
    Ok(response::detail(StatusCode::OK, serde_json::Value::Null))
}

pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<Response, AppError> {
    let user = state.users.create_user(req).await?;
    Ok(response::detail(StatusCode::CREATED, user))
}

pub async fn list_users(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Response, AppError> {
    let page = state.users.list_users(&query).await?;
    Ok(page_response(query.page(), query.limit(), page))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user = state.users.get_user(id).await?;
    Ok(response::detail(StatusCode::OK, user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Response, AppError> {
    let user = state.users.update_user(id, req).await?;
    Ok(response::detail(StatusCode::OK, user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.users.delete_user(id).await?;
    Ok(response::detail(StatusCode::OK, serde_json::Value::Null))
}
