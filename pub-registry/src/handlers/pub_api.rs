//! Hosted pub repository protocol (`application/vnd.pub.v2+json`).

use axum::{
    extract::{Multipart, OriginalUri, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    dtos::pub_package::{UploadFinishQuery, UploadTargetDto},
    handlers::BaseUrl,
    middleware::PubAccess,
    services::ServiceError,
    AppState,
};

pub const PUB_CONTENT_TYPE: &str = "application/vnd.pub.v2+json";

pub const UPLOAD_PATH: &str = "/api/packages/versions/newUpload";
pub const UPLOAD_FINISH_PATH: &str = "/api/packages/versions/newUploadFinish";
const UPLOAD_FIELD: &str = "file";
const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// JSON body with the pub media type.
pub struct PubJson<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for PubJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(body) => (
                self.0,
                [(header::CONTENT_TYPE, HeaderValue::from_static(PUB_CONTENT_TYPE))],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize pub response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct PubMessage {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct PubErrorBody {
    error: PubMessage,
}

#[derive(Debug, Serialize)]
struct PubSuccessMessage {
    message: String,
}

#[derive(Debug, Serialize)]
struct PubSuccessBody {
    success: PubSuccessMessage,
}

/// `{ "error": { "code": "<status>", "message": ... } }`
pub fn pub_error(status: StatusCode, message: impl Into<String>) -> Response {
    PubJson(
        status,
        PubErrorBody {
            error: PubMessage {
                code: status.as_u16().to_string(),
                message: message.into(),
            },
        },
    )
    .into_response()
}

fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => pub_error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect location"),
    }
}

/// Map a catalog failure: NotFound falls back to the upstream mirror when one is set.
fn catalog_error(state: &AppState, path: &str, err: ServiceError) -> Response {
    match err {
        e if e.is_not_found() => match state.registry.upstream_url(path) {
            Some(url) => {
                tracing::debug!(path = %path, upstream = %url, "Redirecting to upstream");
                found(&url)
            }
            None => pub_error(StatusCode::NOT_FOUND, "Not Found"),
        },
        ServiceError::Forbidden => pub_error(StatusCode::FORBIDDEN, "Forbidden"),
        ServiceError::Database(e) => {
            tracing::error!(error = %e, "Database error");
            pub_error(StatusCode::BAD_REQUEST, "Database error")
        }
        e => pub_error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

pub async fn version_list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    BaseUrl(base_url): BaseUrl,
    access: PubAccess,
    Path(package): Path<String>,
) -> Response {
    match state
        .registry
        .version_list(&package, &base_url, access.visibility())
        .await
    {
        Ok(dto) => PubJson(StatusCode::OK, dto).into_response(),
        Err(e) => catalog_error(&state, uri.path(), e),
    }
}

pub async fn version_detail(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    BaseUrl(base_url): BaseUrl,
    access: PubAccess,
    Path((package, version)): Path<(String, String)>,
) -> Response {
    match state
        .registry
        .version_detail(&package, &version, &base_url, access.visibility())
        .await
    {
        Ok(dto) => PubJson(StatusCode::OK, dto).into_response(),
        Err(e) => catalog_error(&state, uri.path(), e),
    }
}

/// `GET /packages/:package/versions/:archive` where `archive` is `<version>.tar.gz`.
pub async fn download(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    BaseUrl(base_url): BaseUrl,
    access: PubAccess,
    Path((package, archive)): Path<(String, String)>,
) -> Response {
    let Some(version) = archive.strip_suffix(ARCHIVE_SUFFIX) else {
        return pub_error(StatusCode::NOT_FOUND, "Not Found");
    };

    match state
        .registry
        .download_url(&package, version, &base_url, access.visibility())
        .await
    {
        Ok(url) => found(&url),
        Err(e) => catalog_error(&state, uri.path(), e),
    }
}

pub async fn upload_target(BaseUrl(base_url): BaseUrl) -> Response {
    PubJson(
        StatusCode::OK,
        UploadTargetDto {
            url: format!("{}{}", base_url, UPLOAD_PATH),
            fields: serde_json::Map::new(),
        },
    )
    .into_response()
}

async fn read_upload_field(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(|e| e.to_string())?;
            return Ok(Some(bytes.to_vec()));
        }
    }
    Ok(None)
}

/// Ingest the archive, then point the client at the finish endpoint. The
/// outcome travels in the `error` query parameter of that location.
pub async fn upload(
    State(state): State<AppState>,
    BaseUrl(base_url): BaseUrl,
    access: PubAccess,
    mut multipart: Multipart,
) -> Response {
    let data = match read_upload_field(&mut multipart).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            return pub_error(
                StatusCode::BAD_REQUEST,
                format!("Missing multipart field `{}`", UPLOAD_FIELD),
            )
        }
        Err(e) => return pub_error(StatusCode::BAD_REQUEST, e),
    };

    let finish_url = format!("{}{}", base_url, UPLOAD_FINISH_PATH);
    let location = match state.registry.upload_version(data, access.uploader_id()).await {
        Ok(_) => finish_url,
        Err(e) => {
            tracing::warn!(error = %e, "Package upload rejected");
            format!("{}?error={}", finish_url, urlencoding::encode(&e.to_string()))
        }
    };

    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::NO_CONTENT, [(header::LOCATION, value)]).into_response(),
        Err(_) => pub_error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect location"),
    }
}

pub async fn upload_finish(Query(query): Query<UploadFinishQuery>) -> Response {
    match query.error.filter(|e| !e.is_empty()) {
        Some(message) => pub_error(StatusCode::BAD_REQUEST, message),
        None => PubJson(
            StatusCode::OK,
            PubSuccessBody {
                success: PubSuccessMessage {
                    message: "Successfully uploaded package.".to_string(),
                },
            },
        )
        .into_response(),
    }
}
