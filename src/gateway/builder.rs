//! Builder for configuring [`Hermod`] instances

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::Hermod;
use crate::cache::{CacheConfig, QueryCache};
use crate::config::Config;
use crate::domains::{self, Domain};
use crate::notify::{Notifier, TracingNotifier};
use crate::resource::{ResourceDescriptor, ResourceFactory};
use crate::transport::{HttpTransport, Transport};
use crate::{HermodError, Result, RetryPolicy};

/// Builder for configuring [`Hermod`] instances.
///
/// ```rust,no_run
/// # use hermod::Hermod;
/// # use std::time::Duration;
/// let hermod = Hermod::builder()
///     .base_url("https://backoffice.example.com/api")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok::<(), hermod::HermodError>(())
/// ```
pub struct HermodBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    bearer_token: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn Notifier>>,
    cache: Option<QueryCache>,
    cache_config: CacheConfig,
    stale_times: HashMap<Domain, Duration>,
    retries: HashMap<Domain, RetryPolicy>,
}

impl HermodBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: None,
            bearer_token: None,
            transport: None,
            notifier: None,
            cache: None,
            cache_config: CacheConfig::default(),
            stale_times: HashMap::new(),
            retries: HashMap::new(),
        }
    }

    /// Seed a builder from a configuration file.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new()
            .base_url(&config.transport.base_url)
            .timeout(config.timeout())
            .cache_config(config.cache_config());
        if let Some(token) = config.bearer_token() {
            builder = builder.bearer_token(token);
        }
        for domain in Domain::ALL {
            let Some(overrides) = config.domain(domain) else {
                continue;
            };
            if let Some(secs) = overrides.stale_time_secs {
                builder = builder.stale_time(domain, Duration::from_secs(secs));
            }
            if let Some(max_retries) = overrides.max_retries {
                builder = builder.retry(domain, config.retry_policy().max_retries(max_retries));
            }
        }
        builder
    }

    /// Backend base URL for the built-in HTTP transport.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Request timeout for the built-in HTTP transport (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Use a custom transport instead of HTTP. `base_url`, `timeout` and
    /// `bearer_token` are ignored when set.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where mutation outcomes are reported (default: [`TracingNotifier`]).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share an existing cache instead of creating one.
    pub fn cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Override a domain's freshness window.
    pub fn stale_time(mut self, domain: Domain, stale_time: Duration) -> Self {
        self.stale_times.insert(domain, stale_time);
        self
    }

    /// Override a domain's read retry policy.
    pub fn retry(mut self, domain: Domain, policy: RetryPolicy) -> Self {
        self.retries.insert(domain, policy);
        self
    }

    fn descriptor(&self, domain: Domain, retry: &RetryPolicy) -> ResourceDescriptor {
        let descriptor = match domain {
            Domain::CustomerTypes => domains::customer_types::descriptor(),
            Domain::ManpowerServices => domains::manpower_services::descriptor(),
            Domain::Invoices => domains::invoices::descriptor(),
            Domain::VisaProcessingServices => domains::visa_processing::descriptor(),
        };
        let descriptor = descriptor.with_retry(self.retries.get(&domain).unwrap_or(retry).clone());
        match self.stale_times.get(&domain) {
            Some(stale_time) => descriptor.with_stale_time(*stale_time),
            None => descriptor,
        }
    }

    fn build_transport(&self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            HermodError::Configuration("no base_url or transport configured".to_string())
        })?;
        url::Url::parse(base_url)
            .map_err(|e| HermodError::Configuration(format!("invalid base_url {base_url}: {e}")))?;
        let mut http = match self.timeout {
            Some(timeout) => HttpTransport::with_timeout(base_url, timeout)?,
            None => HttpTransport::new(base_url)?,
        };
        if let Some(token) = &self.bearer_token {
            http = http.bearer_token(token.clone());
        }
        Ok(Arc::new(http))
    }

    /// Build the data layer.
    pub fn build(self) -> Result<Hermod> {
        let transport = self.build_transport()?;
        let cache = self
            .cache
            .clone()
            .unwrap_or_else(|| QueryCache::new(self.cache_config.clone()));
        let notifier = self
            .notifier
            .clone()
            .unwrap_or_else(|| Arc::new(TracingNotifier));
        let retry = cache.config().retry.clone();

        let factory = ResourceFactory::new(cache, transport, notifier);
        let customer_types = factory.client(self.descriptor(Domain::CustomerTypes, &retry));
        let manpower_services = factory.client(self.descriptor(Domain::ManpowerServices, &retry));
        let invoices = factory.client(self.descriptor(Domain::Invoices, &retry));
        let visa_processing =
            factory.client(self.descriptor(Domain::VisaProcessingServices, &retry));
        Ok(Hermod::new(
            factory,
            customer_types,
            manpower_services,
            invoices,
            visa_processing,
        ))
    }
}

impl Default for HermodBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_base_url_or_transport() {
        let err = HermodBuilder::new().build().unwrap_err();
        assert!(matches!(err, HermodError::Configuration(_)));
    }

    #[test]
    fn build_rejects_malformed_url() {
        let err = HermodBuilder::new().base_url("::nope").build().unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));
    }

    #[test]
    fn overrides_reach_descriptors() {
        let hermod = HermodBuilder::new()
            .base_url("http://localhost:5000/api")
            .stale_time(Domain::Invoices, Duration::from_secs(1))
            .retry(Domain::Invoices, RetryPolicy::disabled())
            .build()
            .unwrap();
        let invoices = hermod.invoices().descriptor();
        assert_eq!(invoices.stale_time(), Duration::from_secs(1));
        assert_eq!(invoices.query_options().retry.max_retries, 0);
        assert_eq!(
            hermod.customer_types().descriptor().stale_time(),
            domains::customer_types::STALE_TIME
        );
    }

    #[test]
    fn from_config_applies_domain_overrides() {
        let config = Config::from_toml_str(
            r#"
            [transport]
            base_url = "http://localhost:5000/api"
            [retry]
            max_retries = 2
            [domains.visaProcessingServices]
            stale_time_secs = 7
            max_retries = 0
        "#,
        )
        .unwrap();
        let hermod = Hermod::from_config(&config).unwrap();
        let visa = hermod.visa_processing().descriptor();
        assert_eq!(visa.stale_time(), Duration::from_secs(7));
        assert_eq!(visa.query_options().retry.max_retries, 0);
        let invoices = hermod.invoices().descriptor();
        assert_eq!(invoices.query_options().retry.max_retries, 2);
    }
}
