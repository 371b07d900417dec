//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{Method, Transport};
use crate::{HermodError, Result};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport over a REST backend.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `base_url` with the default 30s timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HermodError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.url(path);
        let mut request = self.http.request(to_reqwest(method), &url);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(send_error)?;
        let status = response.status();
        let text = response.text().await.map_err(send_error)?;
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&text).ok()
        };

        if status.is_success() {
            return match body {
                Some(body) => Ok(body),
                None if text.trim().is_empty() => Ok(Value::Null),
                None => Err(HermodError::Decode(format!(
                    "{method} {path} returned a non-JSON body"
                ))),
            };
        }
        Err(status_error(status, body))
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn send_error(err: reqwest::Error) -> HermodError {
    if err.is_timeout() {
        HermodError::Timeout
    } else {
        HermodError::Http(err.to_string())
    }
}

/// Classify a non-2xx response.
fn status_error(status: StatusCode, body: Option<Value>) -> HermodError {
    let message = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        });
    match status.as_u16() {
        408 => HermodError::Timeout,
        code if status.is_server_error() => HermodError::HttpServer {
            status: code,
            message,
        },
        code => HermodError::HttpClient {
            status: code,
            message,
            body,
        },
    }
}
