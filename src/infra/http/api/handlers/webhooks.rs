use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use finwage_api_types::{WebhookHealth, WebhookPayload, WebhookResponse};
use tracing::info;

use super::super::error::ApiError;
use super::super::middleware::verify_webhook_secret;
use super::super::state::ApiState;
use super::revalidate::parse_body;
use super::timestamp;

const ENDPOINT: &str = "/api/webhooks/pocketbase";

pub async fn webhook_health() -> Json<WebhookHealth> {
    Json(WebhookHealth {
        status: "ok".to_string(),
        endpoint: ENDPOINT.to_string(),
        timestamp: timestamp(),
    })
}

/// Record store hook: revalidate whatever the changed collection feeds.
pub async fn webhook_receive(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    verify_webhook_secret(&state, &headers)?;
    let payload: WebhookPayload = parse_body(&body)?;
    let record = payload.record.unwrap_or_default();

    let report = state
        .revalidation
        .collection(
            &payload.collection,
            Some(payload.action.as_str()),
            record.id,
            record.slug,
        )
        .await?;

    let message = match report.domain {
        Some(domain) => format!("Revalidated {domain}"),
        None => "No cache mapping for collection".to_string(),
    };
    info!(
        target = "finwage::api::webhook",
        collection = %payload.collection,
        action = %payload.action,
        tags = report.plan.tags().len(),
        failed = report.outcome.failed.len(),
        "webhook handled"
    );

    Ok(Json(WebhookResponse {
        success: true,
        message,
        collection: payload.collection,
        action: payload.action,
        tags: report.tag_names(),
        paths: report.path_names(),
        timestamp: timestamp(),
    }))
}
