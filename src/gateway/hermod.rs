use crate::cache::QueryCache;
use crate::config::Config;
use crate::domains::{CustomerType, Domain, Invoice, ManpowerService, VisaProcessingService};
use crate::mutation::MutationCoordinator;
use crate::resource::{ResourceClient, ResourceFactory};
use crate::Result;

use super::HermodBuilder;

/// The data layer of the back office.
///
/// Holds one client per resource domain, all sharing a single
/// [`QueryCache`], transport and notifier. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Hermod {
    factory: ResourceFactory,
    customer_types: ResourceClient<CustomerType>,
    manpower_services: ResourceClient<ManpowerService>,
    invoices: ResourceClient<Invoice>,
    visa_processing: ResourceClient<VisaProcessingService>,
}

impl Hermod {
    /// Create a new builder.
    pub fn builder() -> HermodBuilder {
        HermodBuilder::new()
    }

    /// Build from a loaded configuration file.
    pub fn from_config(config: &Config) -> Result<Self> {
        HermodBuilder::from_config(config).build()
    }

    pub(super) fn new(
        factory: ResourceFactory,
        customer_types: ResourceClient<CustomerType>,
        manpower_services: ResourceClient<ManpowerService>,
        invoices: ResourceClient<Invoice>,
        visa_processing: ResourceClient<VisaProcessingService>,
    ) -> Self {
        Self {
            factory,
            customer_types,
            manpower_services,
            invoices,
            visa_processing,
        }
    }

    pub fn customer_types(&self) -> &ResourceClient<CustomerType> {
        &self.customer_types
    }

    pub fn manpower_services(&self) -> &ResourceClient<ManpowerService> {
        &self.manpower_services
    }

    pub fn invoices(&self) -> &ResourceClient<Invoice> {
        &self.invoices
    }

    pub fn visa_processing(&self) -> &ResourceClient<VisaProcessingService> {
        &self.visa_processing
    }

    pub fn cache(&self) -> &QueryCache {
        self.factory.cache()
    }

    /// Coordinator for writes outside the four standard clients.
    pub fn coordinator(&self) -> &MutationCoordinator {
        self.factory.coordinator()
    }

    pub fn factory(&self) -> &ResourceFactory {
        &self.factory
    }

    /// Invalidate one domain. Returns the number of entries marked stale.
    pub fn refresh(&self, domain: Domain) -> usize {
        match domain {
            Domain::CustomerTypes => self.customer_types.refresh(),
            Domain::ManpowerServices => self.manpower_services.refresh(),
            Domain::Invoices => self.invoices.refresh(),
            Domain::VisaProcessingServices => self.visa_processing.refresh(),
        }
    }

    /// Invalidate every domain.
    pub fn refresh_all(&self) -> usize {
        Domain::ALL.into_iter().map(|d| self.refresh(d)).sum()
    }
}
