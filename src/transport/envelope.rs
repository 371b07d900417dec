//! Wire envelope shared by list, detail and mutation endpoints.
//!
//! ```json
//! { "success": true, "message": "...", "data": [...], "pagination": { "page": 1, "limit": 20, "total": 42, "pages": 3 } }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{HermodError, Result};

/// Pagination block of a list response.
///
/// Counters that are missing, `null`, negative or non-numeric decode as 0;
/// numeric strings are parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    #[serde(deserialize_with = "lenient_count")]
    pub page: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub limit: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub total: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub pages: u64,
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64),
        _ => None,
    };
    Ok(count.unwrap_or(0))
}

/// Decoded response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

fn default_success() -> bool {
    true
}

impl Envelope {
    /// Decode a response body.
    ///
    /// Objects carrying `success` or `data` are read as envelopes; anything
    /// else is taken as bare data. `success: false` is an
    /// [`HermodError::Envelope`] regardless of the HTTP status.
    pub fn parse(body: Value) -> Result<Self> {
        let is_envelope = body
            .as_object()
            .is_some_and(|o| o.contains_key("success") || o.contains_key("data"));
        let envelope = if is_envelope {
            serde_json::from_value::<Envelope>(body)?
        } else {
            Envelope {
                success: true,
                message: None,
                data: body,
                pagination: None,
            }
        };
        if !envelope.success {
            return Err(HermodError::Envelope {
                message: envelope.message.unwrap_or_default(),
            });
        }
        Ok(envelope)
    }
}
