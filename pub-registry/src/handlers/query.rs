//! Management API over the package catalog.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use service_core::{error::AppError, response};

use crate::{
    dtos::{pub_package::UpdatePackageRequest, ListQuery},
    handlers::page_response,
    middleware::MaybeAuthUser,
    services::Visibility,
    utils::{ValidatedJson, ValidatedQuery},
    AppState,
};

fn visibility(user: &MaybeAuthUser) -> Visibility {
    match user.0 {
        Some(_) => Visibility::All,
        None => Visibility::PublicOnly,
    }
}

pub async fn list_packages(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Response, AppError> {
    let page = state
        .registry
        .query_packages(&query, visibility(&user))
        .await?;
    Ok(page_response(query.page(), query.limit(), page))
}

pub async fn update_package(
    State(state): State<AppState>,
    Path(package): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdatePackageRequest>,
) -> Result<Response, AppError> {
    let private = req.private.unwrap_or(true);
    let package = state.registry.update_package(&package, private).await?;
    Ok(response::detail(StatusCode::OK, package))
}

pub async fn list_versions(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(package): Path<String>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Response, AppError> {
    let page = state
        .registry
        .query_versions(&package, &query, visibility(&user))
        .await?;
    Ok(page_response(query.page(), query.limit(), page))
}

pub async fn version_detail(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path((package, version)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let version = state
        .registry
        .query_version_detail(&package, &version, visibility(&user))
        .await?;
    Ok(response::detail(StatusCode::OK, version))
}
