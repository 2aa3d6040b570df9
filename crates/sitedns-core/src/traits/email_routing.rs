// # Email Routing Trait
//
// Defines the interface for provider-side email forwarding: enabling the
// routing feature on a zone, registering destination addresses and creating
// forwarding rules.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ErrorClassifier;

/// What a routing rule matches on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleMatcher {
    /// Any recipient at the domain (catch-all)
    All,
    /// Exact value of a header field
    Literal {
        /// Field to compare, usually `to`
        field: String,
        /// Expected value
        value: String,
    },
    /// Matcher kinds this crate does not model
    #[serde(other)]
    Other,
}

/// What a routing rule does with matching mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleAction {
    /// Forward to the listed addresses
    Forward {
        /// Destination addresses
        value: Vec<String>,
    },
    /// Silently drop
    Drop,
    /// Action kinds this crate does not model (e.g. workers)
    #[serde(other)]
    Other,
}

/// A forwarding rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Display name of the rule
    pub name: String,
    /// Whether the rule is active
    #[serde(default)]
    pub enabled: bool,
    /// Matchers (all must match)
    #[serde(default)]
    pub matchers: Vec<RuleMatcher>,
    /// Actions applied on match
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl RoutingRule {
    /// Rule forwarding every recipient at `domain` to `destination`
    pub fn catch_all(domain: &str, destination: &str) -> Self {
        Self {
            name: format!("Catch-all *@{} -> {}", domain, destination),
            enabled: true,
            matchers: vec![RuleMatcher::All],
            actions: vec![RuleAction::Forward {
                value: vec![destination.to_string()],
            }],
        }
    }

    /// Rule forwarding `alias@domain` to `destination`
    pub fn alias(alias: &str, domain: &str, destination: &str) -> Self {
        let address = format!("{}@{}", alias, domain);
        Self {
            name: format!("{} -> {}", address, destination),
            enabled: true,
            matchers: vec![RuleMatcher::Literal {
                field: "to".to_string(),
                value: address,
            }],
            actions: vec![RuleAction::Forward {
                value: vec![destination.to_string()],
            }],
        }
    }

    /// Addresses this rule forwards to
    pub fn forward_targets(&self) -> Vec<&str> {
        self.actions
            .iter()
            .flat_map(|action| match action {
                RuleAction::Forward { value } => value.iter().map(String::as_str).collect(),
                RuleAction::Drop | RuleAction::Other => Vec::new(),
            })
            .collect()
    }
}

/// A registered destination address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationAddress {
    /// Address mail is forwarded to
    pub email: String,
    /// Whether the owner confirmed the verification mail
    #[serde(default)]
    pub verified: bool,
}

/// Trait for provider email-routing implementations
#[async_trait]
pub trait EmailRouting: ErrorClassifier {
    /// Turn on email routing for a zone
    async fn enable_routing(&self, zone_id: &str) -> Result<(), crate::Error>;

    /// Register a destination address (the provider sends a verification mail)
    async fn add_destination(&self, email: &str) -> Result<(), crate::Error>;

    /// Create a routing rule in a zone
    async fn create_rule(&self, zone_id: &str, rule: &RoutingRule) -> Result<(), crate::Error>;

    /// List the routing rules of a zone
    async fn list_rules(&self, zone_id: &str) -> Result<Vec<RoutingRule>, crate::Error>;

    /// List registered destination addresses
    async fn list_destinations(&self) -> Result<Vec<DestinationAddress>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_all_rule_wire_shape() {
        let rule = RoutingRule::catch_all("example.test", "owner@mail.test");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["matchers"][0]["type"], "all");
        assert_eq!(json["actions"][0]["type"], "forward");
        assert_eq!(json["actions"][0]["value"][0], "owner@mail.test");
        assert_eq!(json["enabled"], true);
    }

    #[test]
    fn alias_rule_matches_literal_to() {
        let rule = RoutingRule::alias("hello", "example.test", "owner@mail.test");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["matchers"][0]["type"], "literal");
        assert_eq!(json["matchers"][0]["field"], "to");
        assert_eq!(json["matchers"][0]["value"], "hello@example.test");
        assert_eq!(rule.forward_targets(), vec!["owner@mail.test"]);
    }
}
