//! Customer types (reference data used to classify customers).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::require_text;
use crate::mutation::DomainMessages;
use crate::normalize::{FieldRule, Normalizer};
use crate::resource::ResourceDescriptor;

pub const DOMAIN: &str = "customerTypes";
pub const PATH: &str = "/customer-types";

/// Rarely edited; served from cache for five minutes.
pub const STALE_TIME: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerType {
    pub id: String,
    pub value: String,
    pub label: String,
    pub prefix: String,
    pub is_active: bool,
    pub created_at: Option<String>,
}

pub fn normalizer() -> Normalizer {
    Normalizer::new()
        .field(FieldRule::id("id").or("_id"))
        .field(FieldRule::text("value").or("code").or("name"))
        .field(FieldRule::text("label").or("name").or("value"))
        .field(FieldRule::text("prefix").or("code"))
        .field(FieldRule::boolean("isActive").or("active").or("is_active"))
        .field(FieldRule::date("createdAt").or("created_at"))
}

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        DOMAIN,
        PATH,
        normalizer(),
        DomainMessages::new("Customer type"),
    )
    .with_stale_time(STALE_TIME)
    .validate_create(|body| {
        require_text(body, "value", "Value")?;
        require_text(body, "label", "Label")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_legacy_shape() {
        let raw = json!({ "_id": "ct1", "name": "Corporate", "code": "CORP", "active": true });
        let ct: CustomerType = normalizer().normalize_as(&raw).unwrap();
        assert_eq!(
            ct,
            CustomerType {
                id: "ct1".into(),
                value: "CORP".into(),
                label: "Corporate".into(),
                prefix: "CORP".into(),
                is_active: true,
                created_at: None,
            }
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = normalizer();
        let once = n.normalize(&json!({ "id": 3, "value": "agent", "createdAt": "2024-05-01T10:00:00Z" }));
        assert_eq!(n.normalize(&once), once);
        assert_eq!(once["createdAt"], "2024-05-01");
    }
}
