// # Domain Binding Trait
//
// Defines the interface for telling a hosting platform to accept traffic for
// a custom domain once DNS points at it.

use async_trait::async_trait;

use super::ErrorClassifier;

/// Trait for hosting platforms that serve custom domains
#[async_trait]
pub trait DomainBinding: ErrorClassifier {
    /// Attach `domain` to the hosting project `project`
    ///
    /// An "already linked" answer must be returned as an error carrying the
    /// provider payload so the classifier can treat it as success.
    async fn add_custom_domain(&self, project: &str, domain: &str) -> Result<(), crate::Error>;
}
