//! Data-driven entity normalization.
//!
//! Backends disagree on field names (`invoiceNumber` vs `invoiceNo`, nested
//! `customer.id` vs flat `customerId`) and on value types (ids as numbers,
//! amounts as strings). A [`Normalizer`] is an ordered list of
//! [`FieldRule`]s; each rule names the canonical field, its coercion
//! [`FieldKind`], and the source paths to try in priority order. The first
//! source holding a non-null value wins.
//!
//! The canonical name is always the first source, which makes
//! normalization idempotent: `normalize(normalize(x)) == normalize(x)`.

use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::Result;

/// Canonical date format.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Coercion applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// String; absent → `""`.
    Text,
    /// String; absent or empty → `null`.
    OptionalText,
    /// Identifier coerced to string form; absent → `""`.
    Id,
    /// `Number(x ?? 0)`; unparseable strings → 0.
    Number,
    /// Boolean; absent → `false`.
    Bool,
    /// `YYYY-MM-DD`; absent → `null` (or today, for draft defaults).
    Date,
}

/// Dotted path into a raw document, e.g. `customer.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    path: Vec<String>,
}

impl Accessor {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
        }
    }

    /// Resolve against `raw`; `null` counts as absent.
    pub fn get<'a>(&self, raw: &'a Value) -> Option<&'a Value> {
        let mut current = raw;
        for part in &self.path {
            current = current.get(part)?;
        }
        (!current.is_null()).then_some(current)
    }
}

/// One canonical field with its ordered source candidates.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: String,
    kind: FieldKind,
    sources: Vec<Accessor>,
    draft_today: bool,
}

impl FieldRule {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            sources: vec![Accessor::new(name)],
            draft_today: false,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn optional_text(name: &str) -> Self {
        Self::new(name, FieldKind::OptionalText)
    }

    pub fn id(name: &str) -> Self {
        Self::new(name, FieldKind::Id)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// Add a fallback source path, tried after the ones already present.
    pub fn or(mut self, path: &str) -> Self {
        self.sources.push(Accessor::new(path));
        self
    }

    /// Default to today's date when building a draft for a new record.
    pub fn defaults_to_today(mut self) -> Self {
        self.draft_today = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    fn resolve<'a>(&self, raw: &'a Value) -> Option<&'a Value> {
        self.sources.iter().find_map(|s| s.get(raw))
    }

    fn coerce(&self, value: Option<&Value>, draft: bool) -> Value {
        match self.kind {
            FieldKind::Text => Value::String(value.map(text_of).unwrap_or_default()),
            FieldKind::OptionalText => match value.map(text_of) {
                Some(s) if !s.is_empty() => Value::String(s),
                _ => Value::Null,
            },
            FieldKind::Id => Value::String(value.map(id_of).unwrap_or_default()),
            FieldKind::Number => number_value(value.map(number_of).unwrap_or(0.0)),
            FieldKind::Bool => Value::Bool(value.is_some_and(bool_of)),
            FieldKind::Date => match value.and_then(date_of) {
                Some(date) => Value::String(date),
                None if draft && self.draft_today => Value::String(today()),
                None => Value::Null,
            },
        }
    }
}

/// Ordered set of field rules for one domain.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    fields: Vec<FieldRule>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field rule.
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Normalize a persisted record. Missing dates become `null`.
    pub fn normalize(&self, raw: &Value) -> Value {
        self.normalize_with(raw, false)
    }

    /// Normalize a record being created: date fields marked
    /// [`defaults_to_today()`](FieldRule::defaults_to_today) fall back to
    /// the current date instead of `null`.
    pub fn normalize_draft(&self, raw: &Value) -> Value {
        self.normalize_with(raw, true)
    }

    /// Normalize every element of an array. Non-arrays yield an empty list.
    pub fn normalize_many(&self, raw: &Value) -> Vec<Value> {
        raw.as_array()
            .map(|items| items.iter().map(|item| self.normalize(item)).collect())
            .unwrap_or_default()
    }

    /// Normalize and decode into a typed entity.
    pub fn normalize_as<E: DeserializeOwned>(&self, raw: &Value) -> Result<E> {
        Ok(serde_json::from_value(self.normalize(raw))?)
    }

    /// Fill creation-time defaults into an outgoing payload.
    ///
    /// Only date fields marked `defaults_to_today` are touched, and only
    /// when the payload leaves them absent or blank.
    pub fn apply_creation_defaults(&self, payload: &mut Map<String, Value>) {
        for rule in self.fields.iter().filter(|r| r.draft_today) {
            let blank = match payload.get(&rule.name) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if blank {
                payload.insert(rule.name.clone(), Value::String(today()));
            }
        }
    }

    fn normalize_with(&self, raw: &Value, draft: bool) -> Value {
        let mut out = Map::new();
        for rule in &self.fields {
            out.insert(rule.name.clone(), rule.coerce(rule.resolve(raw), draft));
        }
        Value::Object(out)
    }
}

/// Today's local date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Local::now()
        .date_naive()
        .format(DATE_FORMAT)
        .to_string()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(_) => id_of(value),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn id_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        // Populated references: `{ "_id": "...", "name": "..." }`
        Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("id"))
            .map(id_of)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn number_of(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

fn number_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::from(0);
    }
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}

fn bool_of(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn date_of(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive().format(DATE_FORMAT).to_string());
    }
    if let Some(head) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(head, DATE_FORMAT) {
            return Some(date.format(DATE_FORMAT).to_string());
        }
    }
    // Unrecognised formats are kept verbatim rather than dropped.
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice_normalizer() -> Normalizer {
        Normalizer::new()
            .field(FieldRule::id("id").or("_id"))
            .field(FieldRule::text("invoiceNumber").or("invoiceNo"))
            .field(FieldRule::date("date").or("invoiceDate").defaults_to_today())
            .field(FieldRule::id("customerId").or("customer.id").or("customer._id"))
            .field(FieldRule::number("amount").or("total"))
            .field(FieldRule::boolean("isActive"))
            .field(FieldRule::optional_text("notes"))
    }

    #[test]
    fn first_non_null_source_wins() {
        let n = invoice_normalizer();
        let out = n.normalize(&json!({
            "_id": 42,
            "invoiceNumber": null,
            "invoiceNo": "INV-7",
            "customer": { "id": 9 },
            "total": "1500.50",
        }));
        assert_eq!(out["id"], json!("42"));
        assert_eq!(out["invoiceNumber"], json!("INV-7"));
        assert_eq!(out["customerId"], json!("9"));
        assert_eq!(out["amount"], json!(1500.5));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let out = invoice_normalizer().normalize(&json!({}));
        assert_eq!(
            out,
            json!({
                "id": "",
                "invoiceNumber": "",
                "date": null,
                "customerId": "",
                "amount": 0,
                "isActive": false,
                "notes": null,
            })
        );
    }

    #[test]
    fn persisted_dates_never_default_to_today() {
        let n = invoice_normalizer();
        assert_eq!(n.normalize(&json!({ "date": "" }))["date"], Value::Null);
        assert_eq!(n.normalize_draft(&json!({ "date": "" }))["date"], json!(today()));
    }

    #[test]
    fn timestamps_are_cut_to_dates() {
        let n = invoice_normalizer();
        let out = n.normalize(&json!({ "invoiceDate": "2024-03-05T10:00:00.000Z" }));
        assert_eq!(out["date"], json!("2024-03-05"));
    }

    #[test]
    fn numbers_are_coerced() {
        let n = Normalizer::new().field(FieldRule::number("paid"));
        assert_eq!(n.normalize(&json!({ "paid": "abc" }))["paid"], json!(0));
        assert_eq!(n.normalize(&json!({ "paid": 5000.0 }))["paid"], json!(5000));
        assert_eq!(n.normalize(&json!({ "paid": true }))["paid"], json!(1));
    }

    #[test]
    fn populated_reference_ids_are_extracted() {
        let n = Normalizer::new().field(FieldRule::id("customerId").or("customer"));
        let out = n.normalize(&json!({ "customer": { "_id": "abc", "name": "X" } }));
        assert_eq!(out["customerId"], json!("abc"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = invoice_normalizer();
        let inputs = [
            json!({}),
            json!({ "_id": 7, "invoiceNo": "A-1", "customer": { "_id": "c1" }, "total": "12" }),
            json!({ "id": "x", "date": "2024-01-31T23:00:00+00:00", "amount": 1.25, "notes": "" }),
            json!({ "isActive": "yes", "invoiceDate": "31/01/2024" }),
        ];
        for raw in inputs {
            let once = n.normalize(&raw);
            assert_eq!(n.normalize(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn creation_defaults_fill_blank_dates_only() {
        let n = invoice_normalizer();
        let mut payload = Map::new();
        payload.insert("customerId".into(), json!("c1"));
        n.apply_creation_defaults(&mut payload);
        assert_eq!(payload["date"], json!(today()));
        assert!(!payload.contains_key("notes"));

        let mut dated = Map::new();
        dated.insert("date".into(), json!("2023-12-01"));
        n.apply_creation_defaults(&mut dated);
        assert_eq!(dated["date"], json!("2023-12-01"));
    }
}
