use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        content::ContentError, enquiries::EnquiryError, migrations::MigrationError,
        repos::BackendError, revalidation::RevalidationError, seed::SeedError,
    },
    config::LoadError,
    domain::error::DomainError,
    infra::{error::InfraError, revalidate_client::ClientError},
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<ContentError> for HttpError {
    fn from(error: ContentError) -> Self {
        const SOURCE: &str = "infra::http::content_error_to_http_error";
        match &error {
            ContentError::Domain(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid request",
                &error,
            ),
            ContentError::NotFound { .. } => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            ContentError::SourceUnavailable { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Content temporarily unavailable",
                &error,
            ),
            ContentError::Backend { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_GATEWAY,
                "Content could not be loaded",
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Enquiry(#[from] EnquiryError),
    #[error(transparent)]
    Revalidation(#[from] RevalidationError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(_)
            | AppError::Content(ContentError::Domain(_))
            | AppError::Enquiry(EnquiryError::Invalid(_))
            | AppError::Revalidation(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Content(ContentError::NotFound { .. })
            | AppError::Backend(BackendError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Content(ContentError::SourceUnavailable { .. })
            | AppError::Enquiry(EnquiryError::Backend(BackendError::SourceUnavailable { .. }))
            | AppError::Backend(BackendError::SourceUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Content(ContentError::Backend { .. })
            | AppError::Enquiry(EnquiryError::Backend(_))
            | AppError::Backend(_)
            | AppError::Client(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Migration(_)
            | AppError::Seed(_)
            | AppError::Infra(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Request could not be processed",
            StatusCode::NOT_FOUND => "Resource not found",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            StatusCode::BAD_GATEWAY => "Upstream request failed",
            _ => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::ContentDomain;

    #[test]
    fn report_collects_the_source_chain() {
        let error = ContentError::SourceUnavailable {
            domain: ContentDomain::Faqs,
            source: BackendError::unavailable("connection refused"),
        };
        let report = ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &error);

        assert_eq!(
            report.messages,
            vec![
                "faqs source unavailable".to_string(),
                "record store unavailable: connection refused".to_string(),
            ]
        );
    }

    #[test]
    fn statuses_follow_the_failure_kind() {
        let unavailable = AppError::from(ContentError::SourceUnavailable {
            domain: ContentDomain::Blogs,
            source: BackendError::unavailable("timeout"),
        });
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let missing = AppError::from(ContentError::NotFound {
            domain: ContentDomain::Blogs,
            key: "nope".to_string(),
        });
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let rejected = AppError::from(EnquiryError::Backend(BackendError::rejected(400, "bad")));
        assert_eq!(rejected.status_code(), StatusCode::BAD_GATEWAY);

        let invalid = AppError::from(DomainError::unknown_domain("widgets"));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn http_error_attaches_report() {
        let error = HttpError::from(ContentError::NotFound {
            domain: ContentDomain::Blogs,
            key: "missing".to_string(),
        });
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["blogs record `missing` not found"]);
    }
}
