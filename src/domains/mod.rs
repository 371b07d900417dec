//! The four back-office resource domains.
//!
//! Each submodule defines the typed entity, its normalizer (the ordered
//! field-name fallbacks the backend is known to use), create-time
//! validation, and a [`ResourceDescriptor`](crate::ResourceDescriptor).

pub mod customer_types;
pub mod invoices;
pub mod manpower_services;
pub mod visa_processing;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

pub use customer_types::CustomerType;
pub use invoices::Invoice;
pub use manpower_services::ManpowerService;
pub use visa_processing::VisaProcessingService;

use crate::{HermodError, Result};

/// Resource domain identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    CustomerTypes,
    ManpowerServices,
    Invoices,
    VisaProcessingServices,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::CustomerTypes,
        Domain::ManpowerServices,
        Domain::Invoices,
        Domain::VisaProcessingServices,
    ];

    /// Cache key root.
    pub fn name(&self) -> &'static str {
        match self {
            Domain::CustomerTypes => customer_types::DOMAIN,
            Domain::ManpowerServices => manpower_services::DOMAIN,
            Domain::Invoices => invoices::DOMAIN,
            Domain::VisaProcessingServices => visa_processing::DOMAIN,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Domain {
    type Err = HermodError;

    /// Accepts the key root (`customerTypes`) or the REST path segment
    /// (`customer-types`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_start_matches('/').replace('-', "").to_lowercase();
        Domain::ALL
            .into_iter()
            .find(|d| d.name().to_lowercase() == wanted)
            .or(match wanted.as_str() {
                "visaprocessing" | "visas" => Some(Domain::VisaProcessingServices),
                _ => None,
            })
            .ok_or_else(|| HermodError::Configuration(format!("unknown domain: {s}")))
    }
}

fn text_field<'a>(body: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number_field(body: &Map<String, Value>, field: &str) -> Option<f64> {
    match body.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `field` must be a non-blank string.
pub(crate) fn require_text(body: &Map<String, Value>, field: &str, label: &str) -> Result<()> {
    match text_field(body, field) {
        Some(_) => Ok(()),
        None => Err(HermodError::Validation(format!("{label} is required"))),
    }
}

/// `field` must be a number (or numeric string) greater than zero.
pub(crate) fn require_positive(body: &Map<String, Value>, field: &str, label: &str) -> Result<()> {
    match number_field(body, field) {
        Some(n) if n > 0.0 => Ok(()),
        _ => Err(HermodError::Validation(format!(
            "{label} must be greater than zero"
        ))),
    }
}

/// `field`, when present, must not be negative.
pub(crate) fn reject_negative(body: &Map<String, Value>, field: &str, label: &str) -> Result<()> {
    match number_field(body, field) {
        Some(n) if n < 0.0 => Err(HermodError::Validation(format!(
            "{label} cannot be negative"
        ))),
        _ => Ok(()),
    }
}
