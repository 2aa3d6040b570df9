// # sitedns-core
//
// Core library for wiring a statically hosted site's domain to its hosting
// platform.
//
// ## Architecture Overview
//
// This library provides the reconciliation core:
// - **DnsProvider**: Trait for zone lookup and record management via provider APIs
// - **EmailRouting**: Trait for provider-side email forwarding
// - **DomainBinding**: Trait for attaching custom domains at the hosting platform
// - **ErrorClassifier**: Provider capability mapping failures to an `ErrorKind`
// - **Reconciler**: Engine that drives a `ReconciliationPlan` through a provider
// - **ProviderRegistry**: Plugin-based registry for providers
//
// ## Design Principles
//
// 1. **Declarative**: Plans are data; nothing is computed from the zone's contents
// 2. **Idempotent**: Creates are unconditional and "already exists" is success
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Best-Effort**: Failures are collected as outcomes, never raised past a component

pub mod config;
pub mod engine;
pub mod error;
pub mod plan;
pub mod registry;
pub mod report;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, MailConfig, ProviderConfig, SiteConfig, SiteDnsConfig};
pub use engine::{ReconcileEvent, Reconciler};
pub use error::{ApiMessage, Error, ErrorKind, Result};
pub use plan::ReconciliationPlan;
pub use registry::ProviderRegistry;
pub use report::{
    AuditReport, BindOutcome, ReconciliationResult, RoutingOutcome, RoutingStatus, RunReport,
    RunState, UpsertOutcome,
};
pub use traits::{DnsProvider, DnsRecord, DomainBinding, EmailRouting, SiteProvider, Zone};
