//! Serves archives kept by the local storage backend.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{
    handlers::pub_api::pub_error, middleware::PubAccess, services::ServiceError, AppState,
};

/// Split `packages/<name>/versions/<version>.tar.gz` into name and version.
pub fn parse_archive_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("packages/")?;
    let (name, file) = rest.split_once("/versions/")?;
    let version = file.strip_suffix(".tar.gz")?;
    if name.is_empty() || version.is_empty() || name.contains('/') || version.contains('/') {
        return None;
    }
    Some((name, version))
}

pub async fn download(
    State(state): State<AppState>,
    access: PubAccess,
    Path(key): Path<String>,
) -> Response {
    let Some((name, version)) = parse_archive_key(&key) else {
        return pub_error(StatusCode::NOT_FOUND, "Not Found");
    };

    match state
        .registry
        .read_archive(name, version, access.visibility())
        .await
    {
        Ok(data) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            )],
            data,
        )
            .into_response(),
        Err(ServiceError::Forbidden) => pub_error(StatusCode::FORBIDDEN, "Forbidden"),
        Err(e) if e.is_not_found() => pub_error(StatusCode::NOT_FOUND, "Not Found"),
        Err(e) => {
            tracing::error!(error = %e, key = %key, "Failed to read archive");
            pub_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
