//! Visa-processing services sold to clients and sourced from vendors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{reject_negative, require_text};
use crate::mutation::DomainMessages;
use crate::normalize::{FieldRule, Normalizer};
use crate::resource::ResourceDescriptor;

pub const DOMAIN: &str = "visaProcessingServices";
pub const PATH: &str = "/visa-processing-services";
pub const STALE_TIME: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisaProcessingService {
    pub id: String,
    pub service_name: String,
    pub country: String,
    pub visa_type: String,
    pub vendor_id: String,
    pub client_id: String,
    pub fee: f64,
    pub cost: f64,
    pub status: String,
    pub applied_date: Option<String>,
}

pub fn normalizer() -> Normalizer {
    Normalizer::new()
        .field(FieldRule::id("id").or("_id"))
        .field(FieldRule::text("serviceName").or("name"))
        .field(FieldRule::text("country").or("destination"))
        .field(FieldRule::text("visaType").or("visa_type").or("type"))
        .field(
            FieldRule::id("vendorId")
                .or("vendor.id")
                .or("vendor._id"),
        )
        .field(
            FieldRule::id("clientId")
                .or("client.id")
                .or("client._id")
                .or("customerId"),
        )
        .field(FieldRule::number("fee").or("sellingPrice").or("price"))
        .field(FieldRule::number("cost").or("purchasePrice"))
        .field(FieldRule::text("status"))
        .field(
            FieldRule::date("appliedDate")
                .or("applicationDate")
                .or("date")
                .defaults_to_today(),
        )
}

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        DOMAIN,
        PATH,
        normalizer(),
        DomainMessages::new("Visa processing service"),
    )
    .with_stale_time(STALE_TIME)
    .validate_create(|body| {
        require_text(body, "country", "Country")?;
        require_text(body, "clientId", "Client")?;
        reject_negative(body, "fee", "Fee")?;
        reject_negative(body, "cost", "Cost")
    })
}
