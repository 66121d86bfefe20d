//! JSON envelope shared by every management endpoint.
//!
//! ```json
//! { "response_schema": { "response_code": "APP-200", "response_message": "SUCCESS" },
//!   "response_output": { ... } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use once_cell::sync::OnceCell;
use serde::Serialize;

pub const STATUS_SUCCESS: &str = "SUCCESS";

const DEFAULT_APP_CODE: &str = "APP";

static APP_CODE: OnceCell<String> = OnceCell::new();

/// Set the prefix used in `response_code`. Only the first call has an effect.
pub fn set_app_code(code: impl Into<String>) {
    let _ = APP_CODE.set(code.into());
}

pub fn app_code() -> &'static str {
    APP_CODE.get().map(String::as_str).unwrap_or(DEFAULT_APP_CODE)
}

pub fn response_code(status: StatusCode) -> String {
    format!("{}-{}", app_code(), status.as_u16())
}

#[derive(Debug, Serialize)]
pub struct ResponseSchema {
    pub response_code: String,
    pub response_message: String,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub response_schema: ResponseSchema,
    pub response_output: T,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub total: i64,
    pub size: i64,
}

#[derive(Debug, Serialize)]
pub struct PaginatedList<T: Serialize> {
    pub pagination: Pagination,
    pub content: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ListOutput<T: Serialize> {
    pub list: PaginatedList<T>,
}

#[derive(Debug, Serialize)]
pub struct DetailOutput<T: Serialize> {
    pub detail: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, output: T) -> Self {
        Self {
            response_schema: ResponseSchema {
                response_code: response_code(status),
                response_message: message.into(),
            },
            response_output: output,
        }
    }
}

/// Successful response with an arbitrary payload.
pub fn success<T: Serialize>(status: StatusCode, output: T) -> Response {
    (status, Json(Envelope::new(status, STATUS_SUCCESS, output))).into_response()
}

/// Successful response wrapping a single item in `{ "detail": ... }`.
pub fn detail<T: Serialize>(status: StatusCode, item: T) -> Response {
    success(status, DetailOutput { detail: item })
}

/// Successful response wrapping a page in `{ "list": { "pagination", "content" } }`.
pub fn list<T: Serialize>(page: i64, size: i64, total: i64, content: Vec<T>) -> Response {
    success(
        StatusCode::OK,
        ListOutput {
            list: PaginatedList {
                pagination: Pagination { page, total, size },
                content,
            },
        },
    )
}

/// Error response listing field level problems.
pub fn error(status: StatusCode, message: impl Into<String>, errors: Vec<FieldError>) -> Response {
    (
        status,
        Json(Envelope::new(status, message, ErrorOutput { errors })),
    )
        .into_response()
}
