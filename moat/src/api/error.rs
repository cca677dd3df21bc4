use std::borrow::Cow;

use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status_code: StatusCode,
    pub error: Cow<'static, str>,
    pub message: Cow<'static, str>,
}

impl ApiError {
    /// Rejected input, `message` is echoed back sanitized.
    pub fn bad_request(message: impl AsRef<str>) -> Self {
        Self {
            status_code: StatusCode::BAD_REQUEST,
            error: Cow::Borrowed("bad_request"),
            message: Cow::Owned(sanitize(message.as_ref())),
        }
    }

    pub fn server_error() -> Self {
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            error: Cow::Borrowed("server_error"),
            message: Cow::Borrowed("Something went wrong."),
        }
    }

    /// Server side failure reported with its cause.
    pub fn server_error_with(message: impl AsRef<str>) -> Self {
        Self {
            message: Cow::Owned(sanitize(message.as_ref())),
            ..Self::server_error()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code, axum::Json(self)).into_response()
    }
}

/// Escape control characters of text echoed back to API callers.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
