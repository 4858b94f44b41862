//! Client for a running site's revalidation API.
//!
//! Backs the `revalidate` command and lets out-of-process jobs such as `seed` invalidate the
//! server's cache through the same [`CacheStore`] seam the server uses in-process.

use std::time::Duration;

use async_trait::async_trait;
use finwage_api_types::{
    CronRequest, CronResponse, RevalidatePathsRequest, RevalidateResponse, RevalidateTagsRequest,
};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheError, CacheStore, CacheTag, PagePath, RefreshFrequency};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {status}: {body}")]
    Server { status: u16, body: String },
    #[error("failed to parse server response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug)]
pub struct RevalidateClient {
    client: Client,
    base: Url,
    api_key: Option<String>,
    cron_secret: Option<String>,
}

impl RevalidateClient {
    pub fn new(
        server_url: &str,
        api_key: Option<String>,
        cron_secret: Option<String>,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(server_url)?.join("/")?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base,
            api_key,
            cron_secret,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("finwage-site/", env!("CARGO_PKG_VERSION"))
    }

    pub async fn tags(&self, tags: &[String]) -> Result<RevalidateResponse, ClientError> {
        let body = RevalidateTagsRequest {
            tags: tags.to_vec(),
        };
        self.post("api/revalidate/tag", &body, self.api_key.as_deref())
            .await
    }

    pub async fn paths(&self, paths: &[String]) -> Result<RevalidateResponse, ClientError> {
        let body = RevalidatePathsRequest {
            paths: paths.to_vec(),
        };
        self.post("api/revalidate/path", &body, self.api_key.as_deref())
            .await
    }

    pub async fn all(&self) -> Result<RevalidateResponse, ClientError> {
        self.post(
            "api/revalidate/all",
            &serde_json::json!({}),
            self.api_key.as_deref(),
        )
        .await
    }

    /// Trigger a scheduled refresh, authenticating with the cron secret.
    pub async fn frequency(&self, frequency: RefreshFrequency) -> Result<CronResponse, ClientError> {
        let body = CronRequest {
            frequency: frequency.to_string(),
        };
        self.post("api/cron/revalidate", &body, self.cron_secret.as_deref())
            .await
    }

    async fn post<B, T>(&self, path: &str, body: &B, token: Option<&str>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base.join(path)?;
        debug!(url = %url, "Posting revalidation request");

        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Self::handle(request.send().await?).await
    }

    async fn handle<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

fn into_cache_result(result: Result<RevalidateResponse, ClientError>) -> Result<usize, CacheError> {
    match result {
        Ok(response) if response.failed.is_empty() => Ok(0),
        Ok(response) => Err(CacheError::unavailable(format!(
            "server could not invalidate {}",
            response.failed.join(", ")
        ))),
        Err(err) => Err(CacheError::unavailable(err.to_string())),
    }
}

#[async_trait]
impl CacheStore for RevalidateClient {
    async fn invalidate_by_tag(&self, tag: &CacheTag) -> Result<usize, CacheError> {
        into_cache_result(self.tags(&[tag.to_string()]).await)
    }

    async fn invalidate_by_path(&self, path: &PagePath) -> Result<usize, CacheError> {
        into_cache_result(self.paths(&[path.to_string()]).await)
    }
}
