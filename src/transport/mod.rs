//! HTTP transport collaborator.
//!
//! The cache and mutation layers only talk to a [`Transport`]: a thin
//! `get/post/put/patch/delete(path, body?)` surface returning the decoded
//! JSON response body. [`HttpTransport`] is the reqwest-backed
//! implementation; tests substitute their own.
//!
//! Failures are classified on the way out (see [`HermodError`](crate::HermodError)):
//! 4xx → `HttpClient` (carrying the response body), 5xx → `HttpServer`,
//! timeouts → `Timeout`, connection failures → `Http`.

mod envelope;
mod http;

pub use envelope::{Envelope, Pagination};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::keys::Filters;

/// HTTP method used by a [`Transport`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request/response transport.
///
/// `path` is relative to the transport's base URL and may carry a query
/// string. The returned value is the raw response body (usually an
/// [`Envelope`]); an empty body decodes as `null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value>;

    async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Post, path, body).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Put, path, body).await
    }

    async fn patch(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Patch, path, body).await
    }

    async fn delete(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Delete, path, body).await
    }
}

/// Append `filters` to `path` as a query string.
///
/// Only defined, non-empty filters are emitted (blank values never make it
/// into [`Filters`]); keys appear in sorted order.
pub fn with_query(path: &str, filters: &Filters) -> String {
    if filters.is_empty() {
        return path.to_string();
    }
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in filters.query_pairs() {
        query.append_pair(&key, &value);
    }
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{}", query.finish())
}
