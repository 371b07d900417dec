//! Hermod - data synchronization layer for a travel-agency back office
//!
//! This crate fetches, caches, normalizes and invalidates the entities a
//! back-office UI works with: customer types, manpower services, sales
//! invoices and visa-processing services. Reads go through a shared
//! [`QueryCache`] that deduplicates concurrent fetches, retries transient
//! failures and keeps the last good value on error. Writes go through a
//! [`MutationCoordinator`] that patches, removes and invalidates the
//! affected cache keys once the backend confirms.
//!
//! # Example
//!
//! ```rust,no_run
//! use hermod::{Filters, Hermod};
//!
//! #[tokio::main]
//! async fn main() -> hermod::Result<()> {
//!     let hermod = Hermod::builder()
//!         .base_url("https://backoffice.example.com/api")
//!         .build()?;
//!
//!     let pending = hermod
//!         .invoices()
//!         .list(&Filters::new().status("pending").page(1))
//!         .await?;
//!     for invoice in &pending.items {
//!         println!("{} due {}", invoice.invoice_number, invoice.due);
//!     }
//!
//!     hermod
//!         .invoices()
//!         .update("42", serde_json::json!({ "paid": 5000 }))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod domains;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod mutation;
pub mod normalize;
pub mod notify;
pub mod resource;
pub mod retry;
pub mod telemetry;
pub mod transport;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, QueryCache, QueryOptions, QueryStatus, Subscription};
pub use config::Config;
pub use domains::{CustomerType, Domain, Invoice, ManpowerService, VisaProcessingService};
pub use error::{HermodError, Result};
pub use gateway::{Hermod, HermodBuilder};
pub use keys::{CacheKey, Filters, ResourceKeys, Segment};
pub use mutation::{
    BulkOutcome, DomainMessages, Mutation, MutationCoordinator, MutationEffect, MutationKind,
    Patch,
};
pub use normalize::{FieldKind, FieldRule, Normalizer};
pub use notify::{Notification, NotificationIcon, Notifier, TracingNotifier};
pub use resource::{Page, ResourceClient, ResourceDescriptor, ResourceFactory};
pub use retry::RetryPolicy;
pub use transport::{Envelope, HttpTransport, Method, Pagination, Transport};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
