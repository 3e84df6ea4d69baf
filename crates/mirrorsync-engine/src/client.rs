//! Authenticated JSON-over-HTTP client shared by the service clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Default timeout for metadata requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("mirrorsync/", env!("CARGO_PKG_VERSION"));

/// Default headers carrying only an `Accept` value.
pub fn accept_headers(accept: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers
}

/// Bearer-authenticated client rooted at an API base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a client sending `headers` with every request.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        headers: HeaderMap,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Request to `path` under the base URL, or to an absolute URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        };
        self.authorize(self.client.request(method, url))
    }

    /// Send and map non-2xx responses to errors.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        ensure_success(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        decode(response).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        decode(response).await
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(self.request(Method::PATCH, path).json(body))
            .await?;
        decode(response).await
    }

    /// POST without a meaningful response body.
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::POST, path)).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Pass 2xx responses through; turn anything else into a [`SyncError`].
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let exhausted = header_u64(&response, "x-ratelimit-remaining") == Some(0);
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && exhausted)
    {
        let retry_after_secs = header_u64(&response, "retry-after")
            .or_else(|| {
                header_u64(&response, "x-ratelimit-reset").map(|reset| {
                    let now = chrono::Utc::now().timestamp().max(0) as u64;
                    reset.saturating_sub(now)
                })
            })
            .unwrap_or(60);
        warn!(url = %response.url(), retry_after_secs, "Rate limit exceeded");
        return Err(SyncError::RateLimited { retry_after_secs });
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    debug!(%url, status = status.as_u16(), %body, "Request failed");
    Err(SyncError::Api {
        status: status.as_u16(),
        body,
    })
}
