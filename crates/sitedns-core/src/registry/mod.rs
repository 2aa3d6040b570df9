//! Plugin-based provider registry
//!
//! The registry allows providers to be registered dynamically at runtime,
//! avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sitedns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! sitedns_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{SiteProvider, SiteProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Provider registry for plugin-based provider creation
///
/// The registry maintains a map of provider type names to factory objects,
/// allowing dynamic instantiation of providers based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered provider factories
    providers: RwLock<HashMap<String, Box<dyn SiteProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory under `name` (e.g. "cloudflare")
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn SiteProviderFactory>,
    ) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.insert(name.into(), factory);
    }

    /// Create a provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn SiteProvider>)`: Created provider instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn SiteProvider>> {
        let provider_type = config.type_name();
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl SiteProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn SiteProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        assert!(!registry.has_provider("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert!(registry.list_providers().contains(&"mock".to_string()));
    }

    #[test]
    fn test_unknown_provider_type() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::Custom {
            factory: "route53".to_string(),
            config: serde_json::json!({}),
        };

        let err = registry.create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider type: route53"));
    }

    #[test]
    fn test_factory_error_propagates() {
        let registry = ProviderRegistry::new();
        registry.register_provider("mock", Box::new(MockProviderFactory));
        let config = ProviderConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::json!({}),
        };

        assert!(matches!(
            registry.create_provider(&config),
            Err(Error::NotFound(_))
        ));
    }
}
