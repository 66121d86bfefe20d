pub mod health;
pub mod pub_api;
pub mod pub_token;
pub mod query;
pub mod storage;
pub mod user;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use service_core::response;

use crate::{services::database::Page, AppState};

/// Public base URL of this service, without a trailing slash.
#[derive(Debug, Clone)]
pub struct BaseUrl(pub String);

/// Derive the base URL from `X-Forwarded-Proto`/`X-Forwarded-Host` or `Host`.
pub fn base_url_from_headers(headers: &HeaderMap) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = header_str("x-forwarded-proto").unwrap_or("http");
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(BaseUrl(match &state.config.base_url {
            Some(url) => url.clone(),
            None => base_url_from_headers(&parts.headers),
        }))
    }
}

/// Render a service page in the list envelope.
pub(crate) fn page_response<T: serde::Serialize>(
    page: i64,
    size: i64,
    result: Page<T>,
) -> axum::response::Response {
    response::list(page, size, result.total, result.rows)
}
