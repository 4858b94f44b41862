use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::error::ApiError;
use super::state::ApiState;

const API_KEY_HEADER: &str = "x-api-key";
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Guards the revalidation endpoints with the configured API key, read from `x-api-key` or a
/// bearer token.
pub async fn require_api_key(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok().map(str::to_string))
        .or_else(|| extract_token(request.headers().get(axum::http::header::AUTHORIZATION)));

    match authorize(state.secrets.api_key.as_deref(), presented.as_deref(), "api key") {
        Ok(()) => next.run(request).await,
        Err(()) => ApiError::unauthorized("Invalid API key").into_response(),
    }
}

/// Guards the scheduled refresh endpoint with the cron secret as a bearer token.
pub async fn require_cron_secret(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = extract_token(request.headers().get(axum::http::header::AUTHORIZATION));

    match authorize(
        state.secrets.cron_secret.as_deref(),
        presented.as_deref(),
        "cron secret",
    ) {
        Ok(()) => next.run(request).await,
        Err(()) => ApiError::unauthorized("Invalid cron secret").into_response(),
    }
}

/// Checks `x-webhook-secret` against the configured webhook secret.
pub fn verify_webhook_secret(state: &ApiState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    authorize(
        state.secrets.webhook_secret.as_deref(),
        presented,
        "webhook secret",
    )
    .map_err(|()| ApiError::unauthorized("Invalid webhook secret"))
}

/// An unset secret lets every request through.
fn authorize(configured: Option<&str>, presented: Option<&str>, what: &'static str) -> Result<(), ()> {
    let Some(expected) = configured else {
        warn!(
            target = "finwage::api::auth",
            secret = what,
            "no secret configured; allowing unauthenticated request"
        );
        return Ok(());
    };

    match presented {
        Some(value) if bool::from(value.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        Some(_) => {
            warn!(target = "finwage::api::auth", secret = what, "rejected mismatched secret");
            Err(())
        }
        None => {
            warn!(target = "finwage::api::auth", secret = what, "rejected request without secret");
            Err(())
        }
    }
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_secret_allows_everything() {
        assert!(authorize(None, None, "api key").is_ok());
        assert!(authorize(None, Some("anything"), "api key").is_ok());
    }

    #[test]
    fn configured_secret_must_match_exactly() {
        assert!(authorize(Some("s3cret"), Some("s3cret"), "api key").is_ok());
        assert!(authorize(Some("s3cret"), Some("s3cre"), "api key").is_err());
        assert!(authorize(Some("s3cret"), None, "api key").is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let value = HeaderValue::from_static("Bearer abc");
        assert_eq!(extract_token(Some(&value)).as_deref(), Some("abc"));
        let value = HeaderValue::from_static("Basic abc");
        assert_eq!(extract_token(Some(&value)), None);
        assert_eq!(extract_token(None), None);
    }
}
