//! Typed REST clients for the platforms under test.
//!
//! Every client wraps a [`RestClient`], which adds bearer authorization,
//! turns non-2xx responses into [`ApiError::Status`], and decodes bodies into
//! typed structs so a missing field fails at the boundary.

pub mod broker;
pub mod gen3;
pub mod orchestration;
pub mod rawls;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthError, TokenProvider};

pub use broker::BrokerClient;
pub use gen3::Gen3Client;
pub use orchestration::OrchestrationClient;
pub use rawls::RawlsClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("unexpected response body from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not obtain access token: {0}")]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// HTTP status of a non-2xx response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Shared HTTP core for one platform's base URL.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl RestClient {
    /// `tokens` is `None` for public endpoints.
    pub fn new(base_url: &str, tokens: Option<Arc<dyn TokenProvider>>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("bdcat-interop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(tokens) = &self.tokens {
            builder = builder.bearer_auth(tokens.access_token().await?);
        }
        Ok(builder)
    }

    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response, ApiError> {
        tracing::debug!(%endpoint, "sending request");
        builder.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let endpoint = format!("GET {path}");
        let builder = self.request(Method::GET, path).await?;
        let resp = self.send(&endpoint, builder).await?;
        decode(&endpoint, resp).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = format!("POST {path}");
        let builder = self.request(Method::POST, path).await?.json(body);
        let resp = self.send(&endpoint, builder).await?;
        decode(&endpoint, resp).await
    }

    /// DELETE without judging the status; callers decide what 404 means.
    pub async fn delete(&self, path: &str) -> Result<(StatusCode, String), ApiError> {
        let endpoint = format!("DELETE {path}");
        let builder = self.request(Method::DELETE, path).await?;
        let resp = self.send(&endpoint, builder).await?;
        let status = resp.status();
        let body = resp.text().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        Ok((status, body))
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(|source| ApiError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Percent-encode a single path segment.
pub(crate) fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// In-process HTTP stub for client tests.
#[cfg(test)]
pub(crate) mod stub {
    use axum::Router;

    /// Serve `router` on an ephemeral localhost port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
