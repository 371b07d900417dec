//! Hierarchical cache keys.
//!
//! Every key is a sequence of [`Segment`]s rooted at a resource domain:
//! `[domain, scope, discriminator?]`. Keys built by [`ResourceKeys`] are
//! segment-wise extensions of [`ResourceKeys::domain()`], so invalidating the
//! domain key reaches every list, detail and custom key below it.
//!
//! Filter descriptors are canonicalized by [`Filters`] before they become a
//! segment: keys are kept sorted and `null` / empty-string values never make
//! it in. Two descriptors with the same pairs produce the same key no matter
//! the insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Scope segment for list keys.
pub const SCOPE_LIST: &str = "list";
/// Scope segment for detail keys.
pub const SCOPE_DETAIL: &str = "detail";

/// One component of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Domain, scope or custom suffix.
    Name(String),
    /// Entity identifier.
    Id(String),
    /// Canonical JSON of a filter descriptor.
    Filters(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(s) | Segment::Id(s) | Segment::Filters(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::Name(name.to_string())
    }
}

impl From<&Filters> for Segment {
    fn from(filters: &Filters) -> Self {
        Segment::Filters(filters.canonical())
    }
}

/// Deterministic, hierarchical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    segments: Vec<Segment>,
}

impl CacheKey {
    /// Build a key from raw segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Extend this key with one more segment.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The root (domain) segment, if any.
    pub fn domain(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// Segment-wise prefix test. A key is a prefix of itself.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Canonicalized filter descriptor.
///
/// `null` and `""` values are dropped on insertion, so an absent filter and
/// an empty one are indistinguishable. Iteration order is sorted by key.
///
/// ```rust
/// # use hermod::Filters;
/// let a = Filters::new().with("status", "pending").page(1);
/// let b = Filters::new().page(1).with("status", "pending").with("q", "");
/// assert_eq!(a, b);
/// assert_eq!(a.canonical(), r#"{"page":1,"status":"pending"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    values: BTreeMap<String, Value>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object. Non-object values yield empty filters.
    pub fn from_value(value: Value) -> Self {
        let mut filters = Self::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                filters.set(key, value);
            }
        }
        filters
    }

    /// Insert a filter, dropping it when the value is empty.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if is_blank(&value) {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    /// Chaining form of [`set()`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an optional filter; `None` is skipped.
    pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn page(self, page: u32) -> Self {
        self.with("page", page)
    }

    pub fn limit(self, limit: u32) -> Self {
        self.with("limit", limit)
    }

    pub fn search(self, q: impl Into<String>) -> Self {
        self.with("q", q.into())
    }

    pub fn status(self, status: impl Into<String>) -> Self {
        self.with("status", status.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Canonical JSON rendering (sorted keys, no whitespace).
    pub fn canonical(&self) -> String {
        // BTreeMap serializes in key order; nested objects are sorted too
        // because serde_json's default map is ordered by key.
        serde_json::to_string(&self.values).unwrap_or_default()
    }

    /// Query-string pairs in key order. Arrays are comma-joined.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), query_value(v)))
            .collect()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(query_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Key builder for one resource domain.
///
/// Pure: the same inputs always give the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKeys {
    domain: String,
}

impl ResourceKeys {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// The domain name, e.g. `"invoices"`.
    pub fn name(&self) -> &str {
        &self.domain
    }

    /// Root key; every other key of this domain extends it.
    pub fn domain(&self) -> CacheKey {
        CacheKey::new(vec![Segment::Name(self.domain.clone())])
    }

    /// Alias for [`domain()`](Self::domain).
    pub fn all(&self) -> CacheKey {
        self.domain()
    }

    /// Root of all list keys.
    pub fn lists(&self) -> CacheKey {
        self.domain().child(Segment::from(SCOPE_LIST))
    }

    /// List key. Empty filters collapse to [`lists()`](Self::lists).
    pub fn list(&self, filters: Option<&Filters>) -> CacheKey {
        match filters {
            Some(f) if !f.is_empty() => self.lists().child(Segment::from(f)),
            _ => self.lists(),
        }
    }

    /// Root of all detail keys.
    pub fn details(&self) -> CacheKey {
        self.domain().child(Segment::from(SCOPE_DETAIL))
    }

    pub fn detail(&self, id: impl fmt::Display) -> CacheKey {
        self.details().child(Segment::Id(id.to_string()))
    }

    /// Custom key `[domain, suffix, args...]`, e.g. `invoices/pending`.
    pub fn custom(&self, suffix: &str, args: impl IntoIterator<Item = Segment>) -> CacheKey {
        let mut key = self.domain().child(Segment::from(suffix));
        for arg in args {
            key = key.child(arg);
        }
        key
    }
}
