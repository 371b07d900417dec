//! Per-domain resource clients.
//!
//! A [`ResourceDescriptor`] is the static configuration of one domain: REST
//! path, key registry, normalizer, freshness, retry policy and messages. A
//! [`ResourceFactory`] binds descriptors to the shared cache, transport and
//! notifier and hands out [`ResourceClient`]s exposing list, detail, create,
//! update and delete.
//!
//! Every client applies the same invalidation policy after a successful
//! write: the affected detail key is patched (create, update) or removed
//! (delete), then the list root and every sub-list root are invalidated.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::cache::{CacheEntry, Fetcher, QueryCache, QueryOptions, Subscription, fetcher};
use crate::keys::{CacheKey, Filters, ResourceKeys, Segment};
use crate::mutation::{
    BulkOutcome, DomainMessages, Mutation, MutationCoordinator, MutationEffect, MutationKind,
    Patch,
};
use crate::normalize::Normalizer;
use crate::notify::{Notification, Notifier};
use crate::transport::{Envelope, Pagination, Transport, with_query};
use crate::{HermodError, Result, RetryPolicy};

/// Characters escaped in an id placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

type CreateCheck = Arc<dyn Fn(&Map<String, Value>) -> Result<()> + Send + Sync>;

/// A named list below the domain root with its own endpoint, e.g.
/// `invoices/pending` at `/invoices/pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubList {
    pub name: String,
    pub path: String,
}

/// Static configuration of one resource domain.
#[derive(Clone)]
pub struct ResourceDescriptor {
    keys: ResourceKeys,
    path: String,
    normalizer: Normalizer,
    stale_time: Duration,
    retry: RetryPolicy,
    messages: DomainMessages,
    sub_lists: Vec<SubList>,
    validate_create: Option<CreateCheck>,
}

impl ResourceDescriptor {
    /// `domain` is the key root (e.g. `"invoices"`), `path` the REST
    /// collection path (e.g. `"/invoices"`).
    pub fn new(
        domain: &str,
        path: &str,
        normalizer: Normalizer,
        messages: DomainMessages,
    ) -> Self {
        Self {
            keys: ResourceKeys::new(domain),
            path: path.trim_end_matches('/').to_string(),
            normalizer,
            stale_time: Duration::ZERO,
            retry: RetryPolicy::default(),
            messages,
            sub_lists: Vec::new(),
            validate_create: None,
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn sub_list(mut self, name: &str, path: &str) -> Self {
        self.sub_lists.push(SubList {
            name: name.to_string(),
            path: path.to_string(),
        });
        self
    }

    /// Check run on the pruned body before a create is sent.
    pub fn validate_create(
        mut self,
        check: impl Fn(&Map<String, Value>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validate_create = Some(Arc::new(check));
        self
    }

    pub fn domain(&self) -> &str {
        self.keys.name()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn keys(&self) -> &ResourceKeys {
        &self.keys
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn messages(&self) -> &DomainMessages {
        &self.messages
    }

    pub fn sub_lists(&self) -> &[SubList] {
        &self.sub_lists
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    pub fn build_list_key(&self, filters: &Filters) -> CacheKey {
        self.keys.list(Some(filters))
    }

    pub fn build_detail_key(&self, id: &str) -> CacheKey {
        self.keys.detail(id)
    }

    /// `[domain, name]`, extended with the filters when there are any.
    pub fn build_sub_list_key(&self, name: &str, filters: &Filters) -> CacheKey {
        if filters.is_empty() {
            self.keys.custom(name, [])
        } else {
            self.keys.custom(name, [Segment::from(filters)])
        }
    }

    /// Run the create-time check, if the domain has one.
    pub fn check_create(&self, body: &Map<String, Value>) -> Result<()> {
        match &self.validate_create {
            Some(check) => check(body),
            None => Ok(()),
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::new()
            .stale_time(self.stale_time)
            .retry(self.retry.clone())
    }

    /// Keys invalidated after every successful write.
    fn list_roots(&self) -> Vec<CacheKey> {
        let mut roots = vec![self.keys.lists()];
        roots.extend(self.sub_lists.iter().map(|s| self.keys.custom(&s.name, [])));
        roots
    }

    /// `{path}/{id}` with the id percent-encoded as one path segment.
    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, utf8_percent_encode(id, PATH_SEGMENT))
    }

    /// Cached list value: normalized items plus the pagination block.
    fn list_value(&self, envelope: Envelope) -> Value {
        json!({
            "items": self.normalizer.normalize_many(&envelope.data),
            "pagination": envelope.pagination,
        })
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("domain", &self.keys.name())
            .field("path", &self.path)
            .field("stale_time", &self.stale_time)
            .field("retry", &self.retry)
            .field("sub_lists", &self.sub_lists)
            .finish_non_exhaustive()
    }
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<E> {
    pub items: Vec<E>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Remove `null`, empty-string and blank fields from a request body.
///
/// ```rust
/// # use hermod::resource::prune;
/// # use serde_json::json;
/// assert_eq!(prune(json!({ "bill": null, "note": "", "paid": 5000 })), json!({ "paid": 5000 }));
/// ```
pub fn prune(body: Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| match v {
                    Value::Null => false,
                    Value::String(s) => !s.is_empty(),
                    _ => true,
                })
                .collect(),
        ),
        other => other,
    }
}

fn body_object(payload: impl Serialize) -> Result<Map<String, Value>> {
    match prune(serde_json::to_value(payload)?) {
        Value::Object(map) => Ok(map),
        _ => Err(HermodError::Validation(
            "request body must be an object".to_string(),
        )),
    }
}

fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(HermodError::Validation("id is required".to_string()));
    }
    Ok(id)
}

/// Typed client for one resource domain.
pub struct ResourceClient<E> {
    descriptor: Arc<ResourceDescriptor>,
    transport: Arc<dyn Transport>,
    mutations: MutationCoordinator,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for ResourceClient<E> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            transport: Arc::clone(&self.transport),
            mutations: self.mutations.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for ResourceClient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl<E: DeserializeOwned> ResourceClient<E> {
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn keys(&self) -> &ResourceKeys {
        self.descriptor.keys()
    }

    fn cache(&self) -> &QueryCache {
        self.mutations.cache()
    }

    fn list_fetcher(&self, path: String) -> Fetcher {
        let transport = Arc::clone(&self.transport);
        let descriptor = Arc::clone(&self.descriptor);
        fetcher(move || {
            let transport = Arc::clone(&transport);
            let descriptor = Arc::clone(&descriptor);
            let path = path.clone();
            async move {
                let envelope = Envelope::parse(transport.get(&path).await?)?;
                Ok(descriptor.list_value(envelope))
            }
        })
    }

    fn detail_fetcher(&self, id: &str) -> Fetcher {
        let transport = Arc::clone(&self.transport);
        let descriptor = Arc::clone(&self.descriptor);
        let path = descriptor.item_path(id);
        fetcher(move || {
            let transport = Arc::clone(&transport);
            let descriptor = Arc::clone(&descriptor);
            let path = path.clone();
            async move {
                let envelope = Envelope::parse(transport.get(&path).await?)?;
                if envelope.data.is_null() {
                    return Err(HermodError::NotFound(path));
                }
                Ok(descriptor.normalizer().normalize(&envelope.data))
            }
        })
    }

    // Lists

    /// Fetch (or serve from cache) one page of the list.
    pub async fn list(&self, filters: &Filters) -> Result<Page<E>> {
        let key = self.descriptor.build_list_key(filters);
        let fetcher = self.list_fetcher(with_query(self.descriptor.path(), filters));
        let value = self
            .cache()
            .fetch(&key, &fetcher, &self.descriptor.query_options())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Current cache state of the list, scheduling a fetch if needed.
    pub fn list_entry(&self, filters: &Filters) -> CacheEntry {
        let key = self.descriptor.build_list_key(filters);
        let fetcher = self.list_fetcher(with_query(self.descriptor.path(), filters));
        self.cache()
            .get(&key, &fetcher, &self.descriptor.query_options())
    }

    /// Watch the list: subscribe, then trigger a fetch if it is missing or
    /// stale. Invalidations refetch it for as long as the guard lives.
    pub fn subscribe_list(&self, filters: &Filters) -> Subscription {
        let key = self.descriptor.build_list_key(filters);
        let subscription = self.cache().subscribe(&key);
        self.list_entry(filters);
        subscription
    }

    /// Fetch a named sub-list such as `invoices/pending`.
    pub async fn sub_list(&self, name: &str, filters: &Filters) -> Result<Page<E>> {
        let sub = self
            .descriptor
            .sub_lists()
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| {
                HermodError::Configuration(format!(
                    "{} has no sub-list named '{name}'",
                    self.descriptor.domain()
                ))
            })?;
        let key = self.descriptor.build_sub_list_key(name, filters);
        let fetcher = self.list_fetcher(with_query(&sub.path, filters));
        let value = self
            .cache()
            .fetch(&key, &fetcher, &self.descriptor.query_options())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    // Details

    pub async fn detail(&self, id: &str) -> Result<E> {
        let id = require_id(id)?;
        let key = self.descriptor.build_detail_key(id);
        let value = self
            .cache()
            .fetch(&key, &self.detail_fetcher(id), &self.descriptor.query_options())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Current cache state of a detail. A blank id never fetches.
    pub fn detail_entry(&self, id: &str) -> CacheEntry {
        let id = id.trim();
        let key = self.descriptor.build_detail_key(id);
        let options = self.descriptor.query_options().enabled(!id.is_empty());
        self.cache().get(&key, &self.detail_fetcher(id), &options)
    }

    pub fn subscribe_detail(&self, id: &str) -> Subscription {
        let key = self.descriptor.build_detail_key(id.trim());
        let subscription = self.cache().subscribe(&key);
        self.detail_entry(id);
        subscription
    }

    /// Cached detail without scheduling a fetch.
    pub fn peek_detail(&self, id: &str) -> Option<E> {
        let key = self.descriptor.build_detail_key(id.trim());
        self.cache().peek(&key)?.data().and_then(|r| r.ok())
    }

    // Writes

    fn mutation(&self, kind: MutationKind) -> Mutation {
        Mutation::new(
            self.descriptor.domain(),
            kind,
            self.descriptor.messages().clone(),
        )
    }

    /// Effects shared by every write: patch or remove the detail, then
    /// invalidate the list roots.
    fn write_effect(
        &self,
        detail: Option<(CacheKey, Option<Value>)>,
        removed: Option<CacheKey>,
    ) -> MutationEffect {
        let mut effect = MutationEffect::new();
        match detail {
            Some((key, Some(entity))) => {
                effect = effect.patch(
                    Patch::set(key, entity).fresh_for(self.descriptor.stale_time()),
                );
            }
            Some((key, None)) => effect = effect.invalidate(key),
            None => {}
        }
        if let Some(key) = removed {
            effect = effect.remove(key);
        }
        for root in self.descriptor.list_roots() {
            effect = effect.invalidate(root);
        }
        effect
    }

    /// The returned entity normalized, when the response carries one.
    fn returned_entity(&self, data: &Value) -> Option<Value> {
        data.is_object()
            .then(|| self.descriptor.normalizer().normalize(data))
    }

    /// Create a record. Blank fields are pruned and creation defaults
    /// (e.g. today's date) filled in before the request is sent.
    ///
    /// When the response carries the new entity it is written straight to
    /// its detail key; the list roots are invalidated either way.
    pub async fn create(&self, payload: impl Serialize) -> Result<E> {
        let mut body = body_object(payload)?;
        self.descriptor
            .normalizer()
            .apply_creation_defaults(&mut body);

        let mut mutation = self.mutation(MutationKind::Create);
        if let Some(check) = self.descriptor.validate_create.clone() {
            let draft = body.clone();
            mutation = mutation.validate(move || check(&draft));
        }

        let body = Value::Object(body);
        let path = self.descriptor.path().to_string();
        let envelope = self
            .mutations
            .execute(mutation, self.transport.post(&path, Some(&body)), |data| {
                let detail = self.returned_entity(data).and_then(|entity| {
                    let id = entity.get("id")?.as_str().filter(|id| !id.is_empty())?;
                    Some((self.descriptor.build_detail_key(id), Some(entity.clone())))
                });
                self.write_effect(detail, None)
            })
            .await?;

        let entity = self
            .returned_entity(&envelope.data)
            .unwrap_or_else(|| self.descriptor.normalizer().normalize_draft(&body));
        Ok(serde_json::from_value(entity)?)
    }

    /// Partially update a record with `PATCH {path}/{id}`.
    ///
    /// Only the fields present and non-blank in `partial` are sent.
    pub async fn update(&self, id: &str, partial: impl Serialize) -> Result<E> {
        let id = require_id(id)?;
        let body = Value::Object(body_object(partial)?);
        let key = self.descriptor.build_detail_key(id);
        let path = self.descriptor.item_path(id);

        let envelope = self
            .mutations
            .execute(
                self.mutation(MutationKind::Update),
                self.transport.patch(&path, Some(&body)),
                |data| self.write_effect(Some((key.clone(), self.returned_entity(data))), None),
            )
            .await?;

        match self.returned_entity(&envelope.data) {
            Some(entity) => Ok(serde_json::from_value(entity)?),
            None => self.detail(id).await,
        }
    }

    /// Delete a record with `DELETE {path}/{id}`.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delete_inner(id, None, false).await
    }

    /// Delete with a body, for soft deletes such as `{ "value": "..." }`.
    pub async fn delete_with(&self, id: &str, body: impl Serialize) -> Result<()> {
        let body = Value::Object(body_object(body)?);
        self.delete_inner(id, Some(body), false).await
    }

    /// Ask the user first; returns `Ok(false)` when they decline.
    pub async fn delete_confirmed(&self, id: &str) -> Result<bool> {
        let prompt = Notification::question(
            "Are you sure?",
            format!(
                "This {} will be deleted. You won't be able to revert this!",
                self.descriptor.messages().label.to_lowercase()
            ),
        );
        if !self.mutations.notifier().confirm(prompt).await {
            debug!(domain = %self.descriptor.domain(), id, "delete declined");
            return Ok(false);
        }
        self.delete(id).await?;
        Ok(true)
    }

    async fn delete_inner(&self, id: &str, body: Option<Value>, silent: bool) -> Result<()> {
        let id = require_id(id)?;
        let key = self.descriptor.build_detail_key(id);
        let path = self.descriptor.item_path(id);
        self.mutations
            .execute(
                self.mutation(MutationKind::Delete).silent(silent),
                self.transport.delete(&path, body.as_ref()),
                |_| self.write_effect(None, Some(key.clone())),
            )
            .await?;
        Ok(())
    }

    /// Delete several records one after another.
    ///
    /// Each delete runs and settles on its own; a failure never stops the
    /// rest. A single summary notification is routed at the end.
    pub async fn delete_many<I, S>(&self, ids: I) -> BulkOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = BulkOutcome::default();
        for id in ids {
            let id = id.as_ref();
            let result = self.delete_inner(id, None, true).await;
            outcome.record(id, result);
        }
        self.notify_bulk(&outcome);
        outcome
    }

    fn notify_bulk(&self, outcome: &BulkOutcome) {
        if outcome.total() == 0 {
            return;
        }
        let messages = self.descriptor.messages();
        let label = messages.label.to_lowercase();
        // The first failure's reason stands in for the rest.
        let reason = outcome
            .failures
            .first()
            .map(|(_, err)| format!(": {}", messages.error_text(MutationKind::Delete, err)))
            .unwrap_or_default();
        let notification = if outcome.is_success() {
            Notification::success(
                "Deleted",
                format!("{} {label} record(s) deleted successfully", outcome.success_count),
            )
        } else if outcome.success_count == 0 {
            Notification::error(
                "Error",
                format!(
                    "Failed to delete {} {label} record(s){reason}",
                    outcome.failure_count()
                ),
            )
        } else {
            Notification::warning(
                "Partially deleted",
                format!(
                    "{} of {} {label} record(s) deleted; {} failed{reason}",
                    outcome.success_count,
                    outcome.total(),
                    outcome.failure_count()
                ),
            )
        };
        self.mutations.notifier().notify(notification);
    }

    /// Invalidate everything cached for this domain. Returns the number of
    /// entries marked stale.
    pub fn refresh(&self) -> usize {
        self.cache().invalidate(&self.descriptor.keys().domain())
    }
}

/// Binds descriptors to the shared cache, transport and notifier.
#[derive(Clone)]
pub struct ResourceFactory {
    transport: Arc<dyn Transport>,
    mutations: MutationCoordinator,
}

impl ResourceFactory {
    pub fn new(
        cache: QueryCache,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            mutations: MutationCoordinator::new(cache, notifier),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        self.mutations.cache()
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.mutations
    }

    /// Build the client for one domain.
    pub fn client<E: DeserializeOwned>(&self, descriptor: ResourceDescriptor) -> ResourceClient<E> {
        ResourceClient {
            descriptor: Arc::new(descriptor),
            transport: Arc::clone(&self.transport),
            mutations: self.mutations.clone(),
            _entity: PhantomData,
        }
    }
}

impl fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("cache_entries", &self.cache().len())
            .finish_non_exhaustive()
    }
}
