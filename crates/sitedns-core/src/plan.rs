//! Declarative reconciliation plans
//!
//! A [`ReconciliationPlan`] lists what should exist after a run. It is plain
//! data: nothing here talks to a provider, and nothing is computed from the
//! zone's current contents.

use crate::config::SiteDnsConfig;
use crate::traits::{DnsRecord, RecordIdentity, RoutingRule};

/// Exchanges for provider-side email routing, with their MX priorities
pub const ROUTING_MX_HOSTS: &[(&str, u16)] = &[
    ("route1.mx.cloudflare.net", 69),
    ("route2.mx.cloudflare.net", 27),
    ("route3.mx.cloudflare.net", 3),
];

/// SPF policy authorizing the routing exchanges
pub const ROUTING_SPF: &str = "v=spf1 include:_spf.mx.cloudflare.net ~all";

/// Email forwarding to provision for the domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPlan {
    /// Destination every rule forwards to
    pub notify_address: String,
    /// Mailbox aliases that get an explicit literal rule
    pub aliases: Vec<String>,
}

impl RoutingPlan {
    /// The catch-all rule for `domain`
    pub fn catch_all_rule(&self, domain: &str) -> RoutingRule {
        RoutingRule::catch_all(domain, &self.notify_address)
    }

    /// One literal rule per alias, in declaration order
    pub fn alias_rules(&self, domain: &str) -> Vec<(String, RoutingRule)> {
        self.aliases
            .iter()
            .map(|alias| {
                (
                    format!("{}@{}", alias, domain),
                    RoutingRule::alias(alias, domain, &self.notify_address),
                )
            })
            .collect()
    }
}

/// Custom domains to attach at the hosting platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    /// Hosting project
    pub project: String,
    /// Domains to attach, in order
    pub domains: Vec<String>,
}

/// Everything a run should make true
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Apex domain; also the zone name
    pub domain: String,
    /// Records created concurrently; names are unique
    pub records: Vec<DnsRecord>,
    /// Mail records (MX, SPF) created sequentially; names may repeat
    pub mail_records: Vec<DnsRecord>,
    /// Email forwarding, if wanted
    pub routing: Option<RoutingPlan>,
    /// Custom-domain binding, if wanted
    pub binding: Option<BindingPlan>,
}

impl ReconciliationPlan {
    /// Empty plan for `domain`
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            records: Vec::new(),
            mail_records: Vec::new(),
            routing: None,
            binding: None,
        }
    }

    /// CNAME records for the apex (and optionally `www`) pointing at `target`
    pub fn static_site(domain: impl Into<String>, target: &str, include_www: bool) -> Self {
        let domain = domain.into();
        let mut records = vec![DnsRecord::cname(domain.clone(), target)];
        if include_www {
            records.push(DnsRecord::cname(format!("www.{}", domain), target));
        }
        Self {
            records,
            ..Self::new(domain)
        }
    }

    /// Add the MX triplet and SPF record used by provider email routing
    pub fn with_mail_records(mut self) -> Self {
        self.mail_records = ROUTING_MX_HOSTS
            .iter()
            .map(|(host, priority)| DnsRecord::mx(self.domain.clone(), *host, *priority))
            .chain(std::iter::once(DnsRecord::txt(self.domain.clone(), ROUTING_SPF)))
            .collect();
        self
    }

    /// Forward mail for the domain to `notify_address`
    pub fn with_routing(mut self, notify_address: impl Into<String>, aliases: Vec<String>) -> Self {
        self.routing = Some(RoutingPlan {
            notify_address: notify_address.into(),
            aliases,
        });
        self
    }

    /// Attach every batch record name to the hosting `project`
    pub fn with_binding(mut self, project: impl Into<String>) -> Self {
        let domains = self.records.iter().map(|r| r.name.clone()).collect();
        self.binding = Some(BindingPlan {
            project: project.into(),
            domains,
        });
        self
    }

    /// Build the standard plan from configuration
    pub fn from_config(config: &SiteDnsConfig) -> Self {
        let site = &config.site;
        let mut plan = Self::static_site(site.domain.clone(), &site.target(), site.include_www)
            .with_binding(site.project.clone());

        if let Some(notify) = &config.mail.notify_address {
            if config.mail.dns_records {
                plan = plan.with_mail_records();
            }
            plan = plan.with_routing(notify.clone(), config.mail.aliases.clone());
        }

        plan
    }

    /// Identities of every record in the plan
    pub fn identities(&self) -> Vec<RecordIdentity> {
        self.records
            .iter()
            .chain(self.mail_records.iter())
            .map(DnsRecord::identity)
            .collect()
    }
}
