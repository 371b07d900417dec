//! Write path: transport call, cache side effects, user notification.
//!
//! [`MutationCoordinator::execute`] runs one write:
//!
//! 1. the optional validation closure runs first; a failure returns
//!    [`HermodError::Validation`] before anything is sent,
//! 2. the transport call is awaited and its envelope checked,
//! 3. on success the [`MutationEffect`] computed from the returned data is
//!    applied in the order patch, remove, invalidate,
//! 4. on failure no effect is applied and the error is returned.
//!
//! Either way the outcome is routed to the [`Notifier`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::keys::CacheKey;
use crate::notify::{Notification, Notifier};
use crate::telemetry;
use crate::transport::Envelope;
use crate::{HermodError, Result};

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            MutationKind::Create => "created",
            MutationKind::Update => "updated",
            MutationKind::Delete => "deleted",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default user-facing texts for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainMessages {
    /// Singular display name, e.g. `"Invoice"`.
    pub label: String,
    /// Shown when an update/delete fails on a malformed identifier.
    pub invalid_id: String,
}

impl DomainMessages {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let invalid_id = format!("Invalid {} ID format", label.to_lowercase());
        Self { label, invalid_id }
    }

    pub fn invalid_id(mut self, text: impl Into<String>) -> Self {
        self.invalid_id = text.into();
        self
    }

    /// e.g. "Invoice created successfully"
    pub fn success(&self, kind: MutationKind) -> String {
        format!("{} {} successfully", self.label, kind.past_tense())
    }

    /// e.g. "Failed to create invoice"
    pub fn failure(&self, kind: MutationKind) -> String {
        format!("Failed to {kind} {}", self.label.to_lowercase())
    }

    /// Final user-facing error text for a failed mutation.
    ///
    /// Update and delete failures mentioning both "Invalid" and "ID" are
    /// shown as the domain's malformed-identifier message.
    pub fn error_text(&self, kind: MutationKind, err: &HermodError) -> String {
        let text = err.user_message(&self.failure(kind));
        let malformed_id = text.contains("Invalid") && text.contains("ID");
        if kind != MutationKind::Create && malformed_id {
            self.invalid_id.clone()
        } else {
            text
        }
    }
}

type Patcher = Box<dyn FnOnce(Option<&Value>) -> Option<Value> + Send>;

/// A cache write computed from the mutation's result.
pub struct Patch {
    pub key: CacheKey,
    patcher: Patcher,
    /// Freshness of the written value; `None` uses the entry's own stale time.
    pub stale_time: Option<Duration>,
}

impl Patch {
    /// `patcher` receives the current value and returns the replacement;
    /// `None` leaves the entry untouched.
    pub fn new(
        key: CacheKey,
        patcher: impl FnOnce(Option<&Value>) -> Option<Value> + Send + 'static,
    ) -> Self {
        Self {
            key,
            patcher: Box::new(patcher),
            stale_time: None,
        }
    }

    /// Unconditionally write `value`.
    pub fn set(key: CacheKey, value: Value) -> Self {
        Self::new(key, move |_| Some(value))
    }

    pub fn fresh_for(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    fn apply(self, cache: &QueryCache) {
        let current = cache.peek(&self.key).and_then(|entry| entry.value);
        let Some(next) = (self.patcher)(current.as_ref()) else {
            return;
        };
        match self.stale_time {
            Some(stale_time) => cache.set_value_fresh_for(&self.key, next, stale_time),
            None => cache.set_value(&self.key, next),
        }
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("key", &self.key)
            .field("stale_time", &self.stale_time)
            .finish_non_exhaustive()
    }
}

/// Cache side effects of a successful mutation.
#[derive(Debug, Default)]
pub struct MutationEffect {
    pub invalidate: Vec<CacheKey>,
    pub patch: Vec<Patch>,
    pub remove: Vec<CacheKey>,
}

impl MutationEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(mut self, key: CacheKey) -> Self {
        self.invalidate.push(key);
        self
    }

    pub fn patch(mut self, patch: Patch) -> Self {
        self.patch.push(patch);
        self
    }

    pub fn remove(mut self, key: CacheKey) -> Self {
        self.remove.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.invalidate.is_empty() && self.patch.is_empty() && self.remove.is_empty()
    }

    /// Apply patches, then removals, then invalidations.
    pub fn apply(self, cache: &QueryCache) {
        for patch in self.patch {
            patch.apply(cache);
        }
        for key in &self.remove {
            cache.remove(key);
        }
        for key in &self.invalidate {
            cache.invalidate(key);
        }
    }
}

type Validator = Box<dyn FnOnce() -> Result<()> + Send>;

/// Description of one write.
pub struct Mutation {
    domain: String,
    kind: MutationKind,
    messages: DomainMessages,
    validate: Option<Validator>,
    silent: bool,
}

impl Mutation {
    pub fn new(domain: impl Into<String>, kind: MutationKind, messages: DomainMessages) -> Self {
        Self {
            domain: domain.into(),
            kind,
            messages,
            validate: None,
            silent: false,
        }
    }

    /// Pre-flight check. An `Err` aborts before the transport is called.
    pub fn validate(mut self, check: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        self.validate = Some(Box::new(check));
        self
    }

    /// Skip per-mutation notifications (used by bulk operations, which
    /// report a single summary instead).
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("domain", &self.domain)
            .field("kind", &self.kind)
            .field("validate", &self.validate.is_some())
            .field("silent", &self.silent)
            .finish()
    }
}

/// Tally of a bulk operation. Each item runs independently; one failure
/// never aborts the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    pub success_count: usize,
    /// `(id, error)` for every item that failed.
    pub failures: Vec<(String, HermodError)>,
}

impl BulkOutcome {
    pub fn total(&self) -> usize {
        self.success_count + self.failures.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(&mut self, id: impl Into<String>, result: Result<()>) {
        match result {
            Ok(()) => self.success_count += 1,
            Err(err) => self.failures.push((id.into(), err)),
        }
    }
}

/// Runs writes and applies their cache effects.
#[derive(Clone)]
pub struct MutationCoordinator {
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
}

impl MutationCoordinator {
    pub fn new(cache: QueryCache, notifier: Arc<dyn Notifier>) -> Self {
        Self { cache, notifier }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Execute a mutation.
    ///
    /// `call` is the transport request (not polled when validation fails);
    /// its body is decoded as an [`Envelope`]. `effects` derives the cache
    /// side effects from the envelope's `data`.
    pub async fn execute<Fut, F>(&self, mutation: Mutation, call: Fut, effects: F) -> Result<Envelope>
    where
        Fut: Future<Output = Result<Value>>,
        F: FnOnce(&Value) -> MutationEffect,
    {
        let Mutation {
            domain,
            kind,
            messages,
            validate,
            silent,
        } = mutation;

        if let Some(check) = validate {
            if let Err(err) = check() {
                let err = match err {
                    HermodError::Validation(_) => err,
                    other => HermodError::Validation(other.to_string()),
                };
                record(&domain, kind, "error");
                warn!(domain = %domain, operation = %kind, error = %err, "mutation rejected by validation");
                if !silent {
                    self.notifier.notify(Notification::warning(
                        "Validation Error",
                        err.user_message(&messages.failure(kind)),
                    ));
                }
                return Err(err);
            }
        }

        let outcome = match call.await {
            Ok(body) => Envelope::parse(body),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(envelope) => {
                let effect = effects(&envelope.data);
                effect.apply(&self.cache);
                record(&domain, kind, "ok");
                info!(domain = %domain, operation = %kind, "mutation succeeded");
                if !silent {
                    let text = envelope
                        .message
                        .clone()
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| messages.success(kind));
                    self.notifier.notify(Notification::success("Success", text));
                }
                Ok(envelope)
            }
            Err(err) => {
                record(&domain, kind, "error");
                warn!(domain = %domain, operation = %kind, error = %err, "mutation failed");
                if !silent {
                    self.notifier.notify(Notification::error(
                        "Error",
                        messages.error_text(kind, &err),
                    ));
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator").finish_non_exhaustive()
    }
}

fn record(domain: &str, kind: MutationKind, status: &'static str) {
    metrics::counter!(
        telemetry::MUTATIONS_TOTAL,
        "domain" => domain.to_string(),
        "operation" => kind.as_str(),
        "status" => status
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ResourceKeys;
    use crate::notify::NotificationIcon;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Notification>>);

    impl Recorder {
        fn taken(&self) -> Vec<Notification> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification);
        }
    }

    fn coordinator() -> (MutationCoordinator, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let coordinator = MutationCoordinator::new(QueryCache::default(), recorder.clone());
        (coordinator, recorder)
    }

    #[test]
    fn messages_follow_label() {
        let messages = DomainMessages::new("Invoice");
        assert_eq!(messages.success(MutationKind::Create), "Invoice created successfully");
        assert_eq!(messages.failure(MutationKind::Delete), "Failed to delete invoice");
        assert_eq!(messages.invalid_id, "Invalid invoice ID format");
    }

    #[test]
    fn invalid_id_remap_skips_create() {
        let messages = DomainMessages::new("Invoice");
        let err = HermodError::Envelope {
            message: "Invalid ID supplied".into(),
        };
        assert_eq!(
            messages.error_text(MutationKind::Delete, &err),
            "Invalid invoice ID format"
        );
        assert_eq!(
            messages.error_text(MutationKind::Create, &err),
            "Invalid ID supplied"
        );
    }

    #[tokio::test]
    async fn validation_failure_skips_call_and_effects() {
        let (coordinator, recorder) = coordinator();
        let calls = AtomicU32::new(0);
        let key = ResourceKeys::new("invoices").detail(1);

        let mutation = Mutation::new("invoices", MutationKind::Create, DomainMessages::new("Invoice"))
            .validate(|| Err(HermodError::Validation("customer is required".into())));
        let result = coordinator
            .execute(
                mutation,
                async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "success": true }))
                },
                |_| MutationEffect::new().patch(Patch::set(key.clone(), json!({}))),
            )
            .await;

        assert!(matches!(result, Err(HermodError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!coordinator.cache().contains(&key));
        let notes = recorder.taken();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].icon, NotificationIcon::Warning);
        assert_eq!(notes[0].text, "customer is required");
    }

    #[tokio::test]
    async fn envelope_failure_applies_no_effects() {
        let (coordinator, recorder) = coordinator();
        let key = ResourceKeys::new("invoices").detail(1);

        let result = coordinator
            .execute(
                Mutation::new("invoices", MutationKind::Update, DomainMessages::new("Invoice")),
                async { Ok(json!({ "success": false, "message": "Invoice is locked" })) },
                |_| MutationEffect::new().patch(Patch::set(key.clone(), json!({}))),
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            HermodError::Envelope {
                message: "Invoice is locked".into()
            }
        );
        assert!(!coordinator.cache().contains(&key));
        let notes = recorder.taken();
        assert_eq!(notes[0].icon, NotificationIcon::Error);
        assert_eq!(notes[0].text, "Invoice is locked");
    }

    #[tokio::test]
    async fn success_uses_server_message_then_default() {
        let (coordinator, recorder) = coordinator();
        let messages = DomainMessages::new("Invoice");

        coordinator
            .execute(
                Mutation::new("invoices", MutationKind::Create, messages.clone()),
                async { Ok(json!({ "success": true, "message": "Saved!", "data": { "id": "1" } })) },
                |_| MutationEffect::new(),
            )
            .await
            .unwrap();
        coordinator
            .execute(
                Mutation::new("invoices", MutationKind::Delete, messages),
                async { Ok(json!({ "success": true })) },
                |_| MutationEffect::new(),
            )
            .await
            .unwrap();

        let texts: Vec<_> = recorder.taken().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["Saved!", "Invoice deleted successfully"]);
    }

    #[tokio::test]
    async fn effects_apply_patch_before_remove() {
        let (coordinator, _recorder) = coordinator();
        let keys = ResourceKeys::new("invoices");
        let detail = keys.detail(7);

        coordinator
            .execute(
                Mutation::new("invoices", MutationKind::Delete, DomainMessages::new("Invoice"))
                    .silent(true),
                async { Ok(json!({ "success": true })) },
                |_| {
                    MutationEffect::new()
                        .remove(detail.clone())
                        .patch(Patch::set(detail.clone(), json!({ "id": "7" })))
                },
            )
            .await
            .unwrap();

        assert!(!coordinator.cache().contains(&detail));
    }

    #[tokio::test]
    async fn silent_mutation_does_not_notify() {
        let (coordinator, recorder) = coordinator();
        let result = coordinator
            .execute(
                Mutation::new("invoices", MutationKind::Delete, DomainMessages::new("Invoice"))
                    .silent(true),
                async {
                    Err(HermodError::HttpClient {
                        status: 404,
                        message: "Not Found".into(),
                        body: None,
                    })
                },
                |_| MutationEffect::new(),
            )
            .await;
        assert!(result.is_err());
        assert!(recorder.taken().is_empty());
    }

    #[test]
    fn bulk_outcome_tallies() {
        let mut outcome = BulkOutcome::default();
        outcome.record("1", Ok(()));
        outcome.record("2", Err(HermodError::Timeout));
        outcome.record("3", Ok(()));
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count(), 1);
        assert_eq!(outcome.total(), 3);
        assert!(!outcome.is_success());
    }
}
