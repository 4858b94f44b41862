use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use finwage_api_types::{CronRequest, CronResponse};
use serde::Deserialize;
use tracing::info;

use crate::application::revalidation::RevalidationService;

use super::super::error::ApiError;
use super::super::state::ApiState;
use super::revalidate::parse_body;
use super::timestamp;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CronQuery {
    pub frequency: Option<String>,
}

pub async fn cron_get(
    State(state): State<ApiState>,
    Query(query): Query<CronQuery>,
) -> Result<Json<CronResponse>, ApiError> {
    let frequency = query.frequency.ok_or_else(|| {
        ApiError::bad_request(
            "Missing frequency",
            Some("expected hourly, daily or weekly".to_string()),
        )
    })?;
    run(&state, &frequency).await
}

pub async fn cron_post(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<CronResponse>, ApiError> {
    let request: CronRequest = parse_body(&body)?;
    run(&state, &request.frequency).await
}

async fn run(state: &ApiState, frequency: &str) -> Result<Json<CronResponse>, ApiError> {
    let frequency = RevalidationService::parse_frequency(frequency)?;
    let report = state.revalidation.frequency(frequency).await;
    info!(
        target = "finwage::api::cron",
        frequency = %frequency,
        tags = report.plan.tags().len(),
        failed = report.outcome.failed.len(),
        "scheduled refresh handled"
    );

    Ok(Json(CronResponse {
        success: true,
        frequency: frequency.to_string(),
        tags: report.tag_names(),
        timestamp: timestamp(),
    }))
}
