//! Sales invoices, with the `pending` sub-list of unpaid invoices.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{reject_negative, require_positive, require_text};
use crate::mutation::DomainMessages;
use crate::normalize::{FieldRule, Normalizer};
use crate::resource::ResourceDescriptor;

pub const DOMAIN: &str = "invoices";
pub const PATH: &str = "/invoices";

/// Sub-list of invoices with an outstanding balance.
pub const PENDING: &str = "pending";
pub const PENDING_PATH: &str = "/invoices/pending";

pub const STALE_TIME: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub date: Option<String>,
    pub customer_id: String,
    pub customer_name: String,
    pub amount: f64,
    pub paid: f64,
    pub due: f64,
    pub status: String,
    pub notes: Option<String>,
}

pub fn normalizer() -> Normalizer {
    Normalizer::new()
        .field(FieldRule::id("id").or("_id").or("invoiceId"))
        .field(
            FieldRule::text("invoiceNumber")
                .or("invoiceNo")
                .or("invoice_no"),
        )
        .field(
            FieldRule::date("date")
                .or("invoiceDate")
                .or("createdAt")
                .defaults_to_today(),
        )
        .field(
            FieldRule::id("customerId")
                .or("customer.id")
                .or("customer._id")
                .or("customer_id"),
        )
        .field(
            FieldRule::text("customerName")
                .or("customer.name")
                .or("customer_name"),
        )
        .field(FieldRule::number("amount").or("total").or("bill"))
        .field(FieldRule::number("paid").or("received"))
        .field(FieldRule::number("due").or("balance"))
        .field(FieldRule::text("status"))
        .field(FieldRule::optional_text("notes").or("note").or("remarks"))
}

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(DOMAIN, PATH, normalizer(), DomainMessages::new("Invoice"))
        .with_stale_time(STALE_TIME)
        .sub_list(PENDING, PENDING_PATH)
        .validate_create(|body| {
            require_text(body, "customerId", "Customer")?;
            require_positive(body, "amount", "Amount")?;
            reject_negative(body, "paid", "Paid amount")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    #[test]
    fn nested_customer_and_legacy_number() {
        let raw = json!({
            "_id": 42,
            "invoiceNo": "INV-0042",
            "customer": { "_id": "c9", "name": "Al Noor Travels" },
            "total": "12500",
            "paid": 5000,
            "balance": 7500,
            "status": "partial",
            "invoiceDate": "2024-03-10T00:00:00.000Z"
        });
        let invoice: Invoice = normalizer().normalize_as(&raw).unwrap();
        assert_eq!(
            invoice,
            Invoice {
                id: "42".into(),
                invoice_number: "INV-0042".into(),
                date: Some("2024-03-10".into()),
                customer_id: "c9".into(),
                customer_name: "Al Noor Travels".into(),
                amount: 12500.0,
                paid: 5000.0,
                due: 7500.0,
                status: "partial".into(),
                notes: None,
            }
        );
    }

    #[test]
    fn persisted_invoice_without_date_stays_null() {
        let normalized = normalizer().normalize(&json!({ "id": "1" }));
        assert_eq!(normalized["date"], Value::Null);
        assert_eq!(normalized["amount"], 0);
    }

    #[test]
    fn draft_invoice_defaults_date_to_today() {
        let mut body = Map::new();
        body.insert("customerId".into(), json!("c1"));
        normalizer().apply_creation_defaults(&mut body);
        assert_eq!(body["date"], json!(crate::normalize::today()));
    }

    #[test]
    fn has_pending_sub_list() {
        let d = descriptor();
        assert_eq!(d.sub_lists()[0].name, PENDING);
        assert_eq!(d.sub_lists()[0].path, PENDING_PATH);
    }
}
