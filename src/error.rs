//! Hermod error types

/// Hermod error types
///
/// Cloneable so a failed fetch can be stored on its
/// [`CacheEntry`](crate::cache::CacheEntry) and handed to every reader.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HermodError {
    // Client-side errors
    /// A pre-flight check failed; no request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// 4xx response. `message` is the server's `message` field when present.
    #[error("request rejected ({status}): {message}")]
    HttpClient {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// 5xx response.
    #[error("server error ({status}): {message}")]
    HttpServer { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    /// The transport succeeded but the envelope reported `success: false`.
    #[error("{message}")]
    Envelope { message: String },

    // Data errors
    #[error("decode error: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for HermodError {
    fn from(err: serde_json::Error) -> Self {
        HermodError::Decode(err.to_string())
    }
}

impl HermodError {
    /// Whether a retry may succeed.
    ///
    /// Server-class failures (5xx, timeouts, dropped connections) are
    /// transient. Client errors, envelope errors and validation failures
    /// are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HermodError::HttpServer { .. } | HermodError::Timeout | HermodError::Http(_)
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HermodError::HttpClient { status, .. } | HermodError::HttpServer { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// The server-supplied message, if the failure came with one.
    ///
    /// Looks at the envelope message first, then a `message` field in a
    /// 4xx response body.
    pub fn response_message(&self) -> Option<&str> {
        match self {
            HermodError::Envelope { message } if !message.is_empty() => Some(message),
            HermodError::HttpClient { body: Some(body), .. } => body
                .get("message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.is_empty()),
            _ => None,
        }
    }

    /// User-facing text: `response.message → error message → default`.
    pub fn user_message(&self, default: &str) -> String {
        if let Some(message) = self.response_message() {
            return message.to_string();
        }
        let own = match self {
            HermodError::Validation(m)
            | HermodError::Http(m)
            | HermodError::Decode(m)
            | HermodError::NotFound(m)
            | HermodError::Configuration(m) => m.clone(),
            HermodError::HttpClient { message, .. } | HermodError::HttpServer { message, .. } => {
                message.clone()
            }
            HermodError::Envelope { message } => message.clone(),
            HermodError::Timeout => self.to_string(),
        };
        if own.trim().is_empty() {
            default.to_string()
        } else {
            own
        }
    }
}

/// Result type alias for Hermod operations
pub type Result<T> = std::result::Result<T, HermodError>;
