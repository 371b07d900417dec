//! Manpower (recruitment) services offered to clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{reject_negative, require_text};
use crate::mutation::DomainMessages;
use crate::normalize::{FieldRule, Normalizer};
use crate::resource::ResourceDescriptor;

pub const DOMAIN: &str = "manpowerServices";
pub const PATH: &str = "/manpower-services";
pub const STALE_TIME: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManpowerService {
    pub id: String,
    pub service_name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub status: String,
    pub created_at: Option<String>,
}

pub fn normalizer() -> Normalizer {
    Normalizer::new()
        .field(FieldRule::id("id").or("_id"))
        .field(FieldRule::text("serviceName").or("name").or("service_name"))
        .field(FieldRule::text("description").or("details"))
        .field(FieldRule::number("price").or("amount").or("fee"))
        .field(FieldRule::text("currency"))
        .field(FieldRule::text("status"))
        .field(FieldRule::date("createdAt").or("created_at"))
}

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        DOMAIN,
        PATH,
        normalizer(),
        DomainMessages::new("Manpower service"),
    )
    .with_stale_time(STALE_TIME)
    .validate_create(|body| {
        require_text(body, "serviceName", "Service name")?;
        reject_negative(body, "price", "Price")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_falls_back_and_coerces() {
        let raw = json!({ "_id": 11, "name": "Driver placement", "amount": "15000" });
        let svc: ManpowerService = normalizer().normalize_as(&raw).unwrap();
        assert_eq!(svc.id, "11");
        assert_eq!(svc.service_name, "Driver placement");
        assert_eq!(svc.price, 15000.0);
        assert_eq!(svc.description, "");
        assert_eq!(svc.created_at, None);
    }

    #[test]
    fn create_requires_name_and_non_negative_price() {
        let d = descriptor();
        let body = |v: serde_json::Value| v.as_object().cloned().unwrap_or_default();
        assert!(d.check_create(&body(json!({ "price": 100 }))).is_err());
        assert!(d.check_create(&body(json!({ "serviceName": "Visa", "price": -5 }))).is_err());
        assert!(d.check_create(&body(json!({ "serviceName": "Visa" }))).is_ok());
    }
}
