//! PocketBase REST adapter for [`RecordStore`] and [`CollectionRules`].

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::application::repos::{
    BackendError, CollectionRules, ListOptions, RecordStore, RuleKind, RuleSet,
};
use crate::config::BackendSettings;
use crate::domain::records::{Record, RecordPage};

const SUPERUSER_AUTH_PATH: [&str; 4] = ["api", "collections", "_superusers", "auth-with-password"];

#[derive(Debug, Clone)]
struct Credentials {
    identity: String,
    password: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct PocketBaseClient {
    client: Client,
    base: Url,
    credentials: Option<Credentials>,
    token: Mutex<Option<String>>,
}

impl PocketBaseClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(concat!("finwage-site/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| BackendError::unavailable(format!("failed to build client: {err}")))?;

        let credentials = match (&settings.admin_email, &settings.admin_password) {
            (Some(identity), Some(password)) => Some(Credentials {
                identity: identity.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            client,
            base: settings.url.clone(),
            credentials,
            token: Mutex::new(None),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::unavailable("backend URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Superuser token when credentials are configured; authenticates on first use.
    async fn token(&self) -> Result<Option<String>, BackendError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };
        if let Some(token) = self.cached_token() {
            return Ok(Some(token));
        }

        let url = self.url(&SUPERUSER_AUTH_PATH)?;
        let body = json!({
            "identity": credentials.identity,
            "password": credentials.password,
        });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(BackendError::unavailable)?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(BackendError::Auth(format!(
                "superuser login failed with status {status}: {message}"
            )));
        }
        let auth: AuthResponse = decode(response).await?;
        debug!("Authenticated as record store superuser");
        self.store_token(Some(auth.token.clone()));
        Ok(Some(auth.token))
    }

    async fn send(
        &self,
        op: &'static str,
        collection: &str,
        request: RequestBuilder,
    ) -> Result<Response, BackendError> {
        let request = match self.token().await? {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                counter!("backend_request_total", "op" => op, "outcome" => "unavailable")
                    .increment(1);
                warn!(op, collection, error = %err, "Record store unreachable");
                return Err(BackendError::unavailable(err));
            }
        };

        let status = response.status();
        if status.is_success() {
            counter!("backend_request_total", "op" => op, "outcome" => "ok").increment(1);
            return Ok(response);
        }

        counter!("backend_request_total", "op" => op, "outcome" => "error").increment(1);
        let message = error_message(response).await;
        Err(match status {
            StatusCode::NOT_FOUND => BackendError::not_found(collection),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.store_token(None);
                BackendError::Auth(format!("{status}: {message}"))
            }
            status if status.is_server_error() => {
                BackendError::unavailable(format!("{status}: {message}"))
            }
            status => BackendError::rejected(status.as_u16(), message),
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| BackendError::unavailable(format!("response interrupted: {err}")))?;
    serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
}

async fn error_message(response: Response) -> String {
    let bytes = response.bytes().await.unwrap_or_default();
    serde_json::from_slice::<ErrorBody>(&bytes)
        .map(|body| body.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned())
}

fn list_query(options: &ListOptions) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(page) = options.page {
        query.push(("page", page.to_string()));
    }
    if let Some(per_page) = options.per_page {
        query.push(("perPage", per_page.to_string()));
    }
    let text = [
        ("sort", &options.sort),
        ("filter", &options.filter),
        ("fields", &options.fields),
        ("expand", &options.expand),
    ];
    for (name, value) in text {
        if let Some(value) = value {
            query.push((name, value.clone()));
        }
    }
    query
}

fn with_query(mut url: Url, query: &[(&str, String)]) -> Url {
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    url
}

#[async_trait]
impl RecordStore for PocketBaseClient {
    #[instrument(skip_all, fields(collection = %collection))]
    async fn list(
        &self,
        collection: &str,
        options: &ListOptions,
    ) -> Result<RecordPage, BackendError> {
        let url = self.url(&["api", "collections", collection, "records"])?;
        let url = with_query(url, &list_query(options));
        let response = self
            .send("list", collection, self.request(Method::GET, url))
            .await?;
        decode(response).await
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        expand: Option<&str>,
    ) -> Result<Record, BackendError> {
        let url = self.url(&["api", "collections", collection, "records", id])?;
        let query: Vec<_> = expand.map(|e| ("expand", e.to_string())).into_iter().collect();
        let response = self
            .send("get_one", collection, self.request(Method::GET, with_query(url, &query)))
            .await?;
        decode(response).await
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn create(&self, collection: &str, body: &Value) -> Result<Record, BackendError> {
        let url = self.url(&["api", "collections", collection, "records"])?;
        let response = self
            .send(
                "create",
                collection,
                self.request(Method::POST, url).json(body),
            )
            .await?;
        decode(response).await
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let url = self.url(&["api", "collections", collection, "records", id])?;
        self.send("delete", collection, self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CollectionRules for PocketBaseClient {
    async fn rules(&self, collection: &str) -> Result<RuleSet, BackendError> {
        let url = self.url(&["api", "collections", collection])?;
        let response = self
            .send("rules", collection, self.request(Method::GET, url))
            .await?;
        let schema: Map<String, Value> = decode(response).await?;

        let mut rules = RuleSet::new();
        for kind in RuleKind::ALL {
            match schema.get(kind.field()) {
                Some(Value::String(rule)) => {
                    rules.insert(kind, Some(rule.clone()));
                }
                Some(Value::Null) => {
                    rules.insert(kind, None);
                }
                _ => {}
            }
        }
        Ok(rules)
    }

    #[instrument(skip_all, fields(collection = %collection, rules = rules.len()))]
    async fn update_rules(&self, collection: &str, rules: &RuleSet) -> Result<(), BackendError> {
        let body: Map<String, Value> = rules
            .iter()
            .map(|(kind, rule)| {
                let value = rule.clone().map_or(Value::Null, Value::String);
                (kind.field().to_string(), value)
            })
            .collect();
        let url = self.url(&["api", "collections", collection])?;
        self.send(
            "update_rules",
            collection,
            self.request(Method::PATCH, url).json(&body),
        )
        .await?;
        Ok(())
    }
}
