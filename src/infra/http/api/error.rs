use crate::application::content::ContentError;
use crate::application::error::ErrorReport;
use crate::application::revalidation::RevalidationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_ENDPOINT: &str = "invalid_endpoint";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const SOURCE_UNAVAILABLE: &str = "source_unavailable";
    pub const UPSTREAM: &str = "upstream_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message, None)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn invalid_endpoint(endpoint: &str, valid: &[&str]) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_ENDPOINT,
            "Invalid endpoint",
            Some(format!(
                "`{endpoint}` is not one of: {}",
                valid.join(", ")
            )),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ContentError> for ApiError {
    fn from(error: ContentError) -> Self {
        let hint = Some(error.to_string());
        match error {
            ContentError::Domain(_) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid content request",
                hint,
            ),
            ContentError::NotFound { .. } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Record not found",
                hint,
            ),
            ContentError::SourceUnavailable { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::SOURCE_UNAVAILABLE,
                "Content source unavailable",
                hint,
            ),
            ContentError::Backend { .. } => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM,
                "Content source rejected the request",
                hint,
            ),
        }
    }
}

impl From<RevalidationError> for ApiError {
    fn from(error: RevalidationError) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid revalidation request",
            Some(error.to_string()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}
