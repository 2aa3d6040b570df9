// # DNS Provider Trait
//
// Defines the interface for zone lookup and DNS record management via
// provider APIs.
//
// ## Implementations
//
// - Cloudflare: `sitedns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use sitedns_core::traits::{DnsProvider, DnsRecord};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone = provider.find_zone("example.com").await?.expect("zone");
//     provider
//         .create_record(&zone.id, &DnsRecord::cname("www.example.com", "site.pages.dev"))
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ErrorClassifier;

/// TTL sentinel meaning "automatic" at the provider
pub const TTL_AUTO: u32 = 1;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Canonical name
    Cname,
    /// Mail exchanger
    Mx,
    /// Text
    Txt,
    /// Name server
    Ns,
    /// Service locator
    Srv,
    /// Certification authority authorization
    Caa,
}

impl RecordType {
    /// Wire name as used by provider APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
            RecordType::Caa => "CAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            "MX" => Ok(RecordType::Mx),
            "TXT" => Ok(RecordType::Txt),
            "NS" => Ok(RecordType::Ns),
            "SRV" => Ok(RecordType::Srv),
            "CAA" => Ok(RecordType::Caa),
            other => Err(crate::Error::invalid_input(format!(
                "Unsupported record type: {}",
                other
            ))),
        }
    }
}

/// A desired (or observed) DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully-qualified host name
    pub name: String,
    /// Target value
    pub content: String,
    /// Whether traffic is proxied through the provider's edge
    #[serde(default)]
    pub proxied: bool,
    /// Time-to-live in seconds, [`TTL_AUTO`] for automatic
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Priority (required for MX)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

fn default_ttl() -> u32 {
    TTL_AUTO
}

/// De-duplication identity of a record: `(type, name, content)`
pub type RecordIdentity = (RecordType, String, String);

impl DnsRecord {
    /// Create a record with automatic TTL, unproxied, no priority
    pub fn new(record_type: RecordType, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            record_type,
            name: name.into(),
            content: content.into(),
            proxied: false,
            ttl: TTL_AUTO,
            priority: None,
        }
    }

    /// Proxied CNAME record, the shape used for hosting targets
    pub fn cname(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RecordType::Cname, name, target).with_proxied(true)
    }

    /// MX record with the given priority
    pub fn mx(name: impl Into<String>, exchange: impl Into<String>, priority: u16) -> Self {
        Self::new(RecordType::Mx, name, exchange).with_priority(priority)
    }

    /// TXT record
    pub fn txt(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(RecordType::Txt, name, text)
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Identity used for de-duplication
    pub fn identity(&self) -> RecordIdentity {
        (
            self.record_type,
            self.name.to_ascii_lowercase(),
            self.content.clone(),
        )
    }

    /// Check structural validity before a record is sent to a provider
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::invalid_input("record name cannot be empty"));
        }
        if self.content.is_empty() {
            return Err(crate::Error::invalid_input(format!(
                "record content cannot be empty: {} {}",
                self.record_type, self.name
            )));
        }
        if self.record_type == RecordType::Mx && self.priority.is_none() {
            return Err(crate::Error::invalid_input(format!(
                "MX record requires a priority: {}",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.record_type, self.name, self.content)?;
        if let Some(priority) = self.priority {
            write!(f, " (priority {})", priority)?;
        }
        Ok(())
    }
}

/// A provider zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider-scoped opaque identifier
    pub id: String,
    /// Domain name the zone serves
    pub name: String,
}

impl Zone {
    /// Create a zone handle
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A record as it exists at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// The record ID (provider-specific)
    pub id: String,
    /// The record itself
    pub record: DnsRecord,
}

/// Trait for DNS provider implementations
///
/// Implementations handle one provider's zone and record API. They are
/// single-shot: one HTTP exchange per call, no retry, no caching. The
/// reconciliation engine owns sequencing and concurrency.
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the engine calls `create_record`
/// from several tasks at once.
#[async_trait]
pub trait DnsProvider: ErrorClassifier {
    /// Look up the zone whose name is exactly `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Zone))`: First matching zone
    /// - `Ok(None)`: The provider has no such zone
    /// - `Err(Error)`: The lookup call failed
    async fn find_zone(&self, domain: &str) -> Result<Option<Zone>, crate::Error>;

    /// List every record in a zone
    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordMetadata>, crate::Error>;

    /// Create a record unconditionally
    ///
    /// An "already exists" answer must be returned as an error carrying the
    /// provider payload; classification is done through [`ErrorClassifier`].
    async fn create_record(&self, zone_id: &str, record: &DnsRecord) -> Result<(), crate::Error>;

    /// Replace an existing record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DnsRecord,
    ) -> Result<(), crate::Error>;

    /// Delete a record by ID
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Check if this provider can manage the given record
    fn supports_record(&self, record: &DnsRecord) -> bool;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_metadata() {
        let a = DnsRecord::cname("Example.test", "proj.pages.dev");
        let b = DnsRecord::cname("example.test", "proj.pages.dev")
            .with_proxied(false)
            .with_ttl(300);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn mx_requires_priority() {
        let mut record = DnsRecord::mx("example.test", "route1.mx.cloudflare.net", 69);
        assert!(record.validate().is_ok());
        record.priority = None;
        assert!(record.validate().is_err());
    }

    #[test]
    fn record_type_parses_wire_names() {
        assert_eq!("CNAME".parse::<RecordType>().unwrap(), RecordType::Cname);
        assert_eq!("aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert!("HTTPS".parse::<RecordType>().is_err());
    }

    #[test]
    fn record_serializes_in_wire_shape() {
        let json = serde_json::to_value(DnsRecord::cname("example.test", "proj.pages.dev")).unwrap();
        assert_eq!(json["type"], "CNAME");
        assert_eq!(json["ttl"], 1);
        assert_eq!(json["proxied"], true);
        assert!(json.get("priority").is_none());

        let mx = serde_json::to_value(DnsRecord::mx("example.test", "mx.test", 3)).unwrap();
        assert_eq!(mx["priority"], 3);
    }

    #[test]
    fn display_includes_priority() {
        let record = DnsRecord::mx("example.test", "route3.mx.cloudflare.net", 3);
        assert_eq!(
            record.to_string(),
            "MX example.test -> route3.mx.cloudflare.net (priority 3)"
        );
    }
}
