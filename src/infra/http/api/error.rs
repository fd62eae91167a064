use std::error::Error as StdError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::error::ErrorReport;

/// Client-facing error envelope. `detail` is only filled in by the
/// `expose_error_details` middleware.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const VALIDATION: &str = "validation_error";
    pub const NOT_FOUND: &str = "not_found";
    pub const PARENT_NOT_FOUND: &str = "parent_not_found";
    pub const NOTHING_TO_RESTORE: &str = "nothing_to_restore";
    pub const CONFLICT: &str = "conflict";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const STORE: &str = "store_error";
    pub const FALLBACK: &str = "fallback_error";
    pub const INTERNAL: &str = "internal_error";
}

pub const STORE_MESSAGE: &str = "Lỗi truy cập cơ sở dữ liệu";
pub const FALLBACK_MESSAGE: &str = "Lỗi đọc dữ liệu dự phòng";
pub const INTERNAL_MESSAGE: &str = "Lỗi hệ thống";

const SOURCE: &str = "infra::http::api";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let report = ErrorReport::from_message(SOURCE, status, format!("{code}: {message}"));
        Self {
            status,
            code,
            message,
            report,
        }
    }

    /// Public message for the client, full chain of `err` for the logs.
    pub fn from_error(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        err: &dyn StdError,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            report: ErrorReport::from_error(SOURCE, status, err),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::VALIDATION, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, codes::CONFLICT, message)
    }

    pub fn internal(err: &dyn StdError) -> Self {
        Self::from_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            INTERNAL_MESSAGE,
            err,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            code: self.code.to_string(),
            detail: None,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
