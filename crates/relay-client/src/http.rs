//! JSON over HTTP against the backend.
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure of one HTTP round trip to a backend service.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid endpoint {path}: {source}")]
    Endpoint {
        path: String,
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport { url: Url, source: reqwest::Error },

    #[error("{url} answered {status}: {body}")]
    Status {
        url: Url,
        status: StatusCode,
        body: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: Url,
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Human-readable reason carried in an error body, if any.
    ///
    /// Backends answer failures with `{ "message": ... }` or `{ "error": ... }`;
    /// anything else yields the raw body.
    pub fn server_message(&self) -> Option<String> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let field = parsed.as_ref().and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|m| m.as_str()))
                .map(str::to_owned)
        });
        Some(field.unwrap_or_else(|| body.clone()))
    }
}

/// JSON client bound to one service base url.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    /// Client for `base` whose requests time out after `timeout`.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base))
    }

    /// Reuse `client`. A trailing slash is added to `base` so paths join under it.
    pub fn with_client(client: Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { client, base }
    }

    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// `path` resolved against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|source| ApiError::Endpoint {
                path: path.to_string(),
                source,
            })
    }

    /// GET `path` with `query` and decode the JSON body.
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, ApiError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(message = "GET", url = %url);
        let request = self.client.get(url.clone());
        self.execute(url, request).await
    }

    /// POST `body` as JSON to `path` and decode the JSON answer.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(message = "POST", url = %url);
        let request = self.client.post(url.clone()).json(body);
        self.execute(url, request).await
    }

    /// POST `body`, checking the status only.
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!(message = "POST", url = %url);
        let request = self.client.post(url.clone()).json(body);
        self.send(url, request).await.map(|_| ())
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        url: Url,
        request: reqwest::RequestBuilder,
    ) -> Result<R, ApiError> {
        let body = self.send(url.clone(), request).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { url, source })
    }

    async fn send(&self, url: Url, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return Err(ApiError::Transport { url, source }),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => return Err(ApiError::Transport { url, source }),
        };

        if !status.is_success() {
            return Err(ApiError::Status { url, status, body });
        }
        Ok(body)
    }
}
