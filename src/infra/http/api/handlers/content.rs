use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::application::repos::ListOptions;
use crate::domain::content::ContentDomain;
use crate::domain::records::{Record, RecordPage};

use super::super::error::ApiError;
use super::super::state::ApiState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

impl ContentQuery {
    fn into_options(self) -> ListOptions {
        ListOptions {
            page: self.page,
            per_page: self.per_page,
            sort: self.sort.filter(|sort| !sort.trim().is_empty()),
            filter: self.filter.filter(|filter| !filter.trim().is_empty()),
            ..ListOptions::default()
        }
    }
}

pub async fn list_content(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<RecordPage>, ApiError> {
    let domain = public_domain(&domain)?;
    let page = state.content.list(domain, query.into_options()).await?;
    Ok(Json(page))
}

pub async fn get_content(
    State(state): State<ApiState>,
    Path((domain, key)): Path<(String, String)>,
) -> Result<Json<Record>, ApiError> {
    let domain = public_domain(&domain)?;
    let record = state.content.get_by_slug_or_id(domain, &key).await?;
    Ok(Json(record))
}

fn public_domain(name: &str) -> Result<ContentDomain, ApiError> {
    name.parse::<ContentDomain>()
        .ok()
        .filter(|domain| domain.is_public())
        .ok_or_else(|| ApiError::not_found("Unknown content domain"))
}
