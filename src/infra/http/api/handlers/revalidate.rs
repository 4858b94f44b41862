use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use finwage_api_types::{
    RevalidateCollectionRequest, RevalidatePathsRequest, RevalidateResponse,
    RevalidateTagsRequest,
};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::application::revalidation::RevalidationReport;

use super::super::error::ApiError;
use super::super::state::ApiState;
use super::timestamp;

const ENDPOINTS: [&str; 4] = ["collection", "tag", "path", "all"];

pub async fn revalidate(
    State(state): State<ApiState>,
    Path(endpoint): Path<String>,
    body: Bytes,
) -> Result<Json<RevalidateResponse>, ApiError> {
    let service = &state.revalidation;
    let report = match endpoint.as_str() {
        "collection" => {
            let request: RevalidateCollectionRequest = parse_body(&body)?;
            let record = request.record.unwrap_or_default();
            service
                .collection(
                    &request.collection,
                    request.action.as_deref(),
                    record.id,
                    record.slug,
                )
                .await?
        }
        "tag" => {
            let request: RevalidateTagsRequest = parse_body(&body)?;
            service.tags(&request.tags).await?
        }
        "path" => {
            let request: RevalidatePathsRequest = parse_body(&body)?;
            service.paths(&request.paths).await?
        }
        "all" => service.all().await,
        other => return Err(ApiError::invalid_endpoint(other, &ENDPOINTS)),
    };

    info!(
        target = "finwage::api::revalidate",
        endpoint = %endpoint,
        tags = report.plan.tags().len(),
        paths = report.plan.paths().len(),
        failed = report.outcome.failed.len(),
        duration = %report.elapsed_label(),
        "revalidation request handled"
    );
    Ok(Json(response(&endpoint, &report)))
}

fn response(endpoint: &str, report: &RevalidationReport) -> RevalidateResponse {
    RevalidateResponse {
        success: true,
        endpoint: endpoint.to_string(),
        duration: report.elapsed_label(),
        timestamp: timestamp(),
        tags: report.tag_names(),
        paths: report.path_names(),
        failed: report.outcome.failed.clone(),
    }
}

/// Decode a JSON body; an empty body counts as `{}`.
pub(super) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request("Malformed request body", Some(err.to_string())))
}
