//! Configuration types for sitedns
//!
//! This module defines all configuration structures used throughout the
//! crate. A [`SiteDnsConfig`] is built once at startup and handed to the
//! provider factory and the reconciliation engine; nothing reads the
//! process environment after that.

use serde::{Deserialize, Serialize};

/// Mailbox aliases that get an explicit forwarding rule by default
pub const DEFAULT_MAIL_ALIASES: &[&str] = &["hello", "contact", "info", "support", "admin"];

/// Main sitedns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDnsConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// The site whose domain is reconciled
    pub site: SiteConfig,

    /// Email forwarding settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SiteDnsConfig {
    /// Create a configuration for `domain` served by `project`, with defaults
    pub fn new(provider: ProviderConfig, domain: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            provider,
            site: SiteConfig::new(domain, project),
            mail: MailConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.site.validate()?;
        self.mail.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare (global API key authentication)
    Cloudflare {
        /// Account email sent as `X-Auth-Email`
        email: String,
        /// Global API key sent as `X-Auth-Key`
        api_key: String,
        /// Account ID (email routing addresses, Pages projects)
        account_id: String,
        /// Zone ID (optional, looked up by domain when absent)
        #[serde(default)]
        zone_id: Option<String>,
        /// Log mutating calls instead of sending them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                email,
                api_key,
                account_id,
                ..
            } => {
                if email.is_empty() {
                    return Err(crate::Error::config("Cloudflare account email cannot be empty"));
                }
                if api_key.is_empty() {
                    return Err(crate::Error::config("Cloudflare API key cannot be empty"));
                }
                if account_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare account ID cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Cloudflare {
                email,
                account_id,
                zone_id,
                dry_run,
                ..
            } => f
                .debug_struct("Cloudflare")
                .field("email", email)
                .field("api_key", &"<REDACTED>")
                .field("account_id", account_id)
                .field("zone_id", zone_id)
                .field("dry_run", dry_run)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// The site being wired up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Apex domain (e.g. "example.com")
    pub domain: String,

    /// Hosting project name at the platform
    pub project: String,

    /// CNAME target; `{project}.pages.dev` when absent
    #[serde(default)]
    pub target: Option<String>,

    /// Also point `www.{domain}` at the target
    #[serde(default = "default_true")]
    pub include_www: bool,
}

impl SiteConfig {
    /// Create a site configuration with defaults
    pub fn new(domain: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            project: project.into(),
            target: None,
            include_www: true,
        }
    }

    /// Set an explicit CNAME target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// The CNAME target records should point at
    pub fn target(&self) -> String {
        self.target
            .clone()
            .unwrap_or_else(|| format!("{}.pages.dev", self.project))
    }

    /// Validate the site configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.domain)?;
        if self.project.is_empty() {
            return Err(crate::Error::config("Hosting project name cannot be empty"));
        }
        validate_domain_name(&self.target())?;
        Ok(())
    }
}

/// Email forwarding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Address all mail is forwarded to; mail setup is skipped when absent
    #[serde(default)]
    pub notify_address: Option<String>,

    /// Mailbox aliases that get an explicit rule
    #[serde(default = "default_aliases")]
    pub aliases: Vec<String>,

    /// Create the MX/SPF records for provider routing
    #[serde(default = "default_true")]
    pub dns_records: bool,
}

impl MailConfig {
    /// Whether email forwarding should be configured at all
    pub fn is_enabled(&self) -> bool {
        self.notify_address.is_some()
    }

    /// Validate the mail configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(address) = &self.notify_address {
            let valid = address
                .split_once('@')
                .is_some_and(|(local, host)| !local.is_empty() && host.contains('.'));
            if !valid {
                return Err(crate::Error::config(format!(
                    "Notification address is not a valid email: {}",
                    address
                )));
            }
        }
        for alias in &self.aliases {
            if alias.is_empty() || alias.contains('@') || alias.contains(char::is_whitespace) {
                return Err(crate::Error::config(format!(
                    "Invalid mailbox alias: '{}'",
                    alias
                )));
            }
        }
        Ok(())
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            notify_address: None,
            aliases: default_aliases(),
            dns_records: true,
        }
    }
}

fn default_aliases() -> Vec<String> {
    DEFAULT_MAIL_ALIASES.iter().map(|a| a.to_string()).collect()
}

fn default_true() -> bool {
    true
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of record creations in flight at once
    ///
    /// Kept small to stay under provider rate limits.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Bind custom domains even when the record batch did not fully succeed
    #[serde(default)]
    pub bind_on_partial_dns: bool,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=16).contains(&self.concurrency) {
            return Err(crate::Error::config(format!(
                "Engine concurrency must be between 1 and 16. Got: {}",
                self.concurrency
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
            bind_on_partial_dns: false,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_event_channel_capacity() -> usize {
    256
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, characters and hyphen
/// placement. Not exhaustive, but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
