//! Core traits for sitedns
//!
//! This module defines the abstract interfaces that provider integrations
//! must follow.
//!
//! - [`DnsProvider`]: Zone lookup and DNS record management
//! - [`EmailRouting`]: Provider-side email forwarding
//! - [`DomainBinding`]: Custom-domain attachment at the hosting platform
//! - [`ErrorClassifier`]: Provider-specific failure classification
//! - [`SiteProvider`]: Everything the reconciliation engine needs from one vendor

pub mod classifier;
pub mod dns_provider;
pub mod domain_binding;
pub mod email_routing;

pub use classifier::{ErrorClassifier, classify_messages, default_classification};
pub use dns_provider::{
    DnsProvider, DnsRecord, RecordIdentity, RecordMetadata, RecordType, TTL_AUTO, Zone,
};
pub use domain_binding::DomainBinding;
pub use email_routing::{DestinationAddress, EmailRouting, RoutingRule, RuleAction, RuleMatcher};

use std::sync::Arc;

/// A vendor that manages DNS, email routing and custom domains
///
/// Blanket-implemented for every type implementing the three capability
/// traits, so the engine can hold a single `Arc<dyn SiteProvider>`.
pub trait SiteProvider: DnsProvider + EmailRouting + DomainBinding {}

impl<T> SiteProvider for T where T: DnsProvider + EmailRouting + DomainBinding {}

/// Helper trait for constructing providers from configuration
pub trait SiteProviderFactory: Send + Sync {
    /// Create a provider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A shared provider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Arc<dyn SiteProvider>, crate::Error>;
}
