//! Cloudflare API v4 wire types

use serde::{Deserialize, Serialize};
use sitedns_core::ApiMessage;
use sitedns_core::traits::{DnsRecord, RecordMetadata};

/// Envelope every Cloudflare v4 response is wrapped in
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<CloudflareResultInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

impl From<CloudflareError> for ApiMessage {
    fn from(err: CloudflareError) -> Self {
        ApiMessage {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareResultInfo {
    #[serde(default)]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
}

/// DNS record as returned by the record list endpoint
#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub proxied: Option<bool>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub priority: Option<u16>,
}

impl CloudflareDnsRecord {
    /// Convert into the core model; `None` for record types the core does not model
    pub fn into_metadata(self) -> Option<RecordMetadata> {
        let record_type = self.record_type.parse().ok()?;
        let mut record = DnsRecord::new(record_type, self.name, self.content)
            .with_proxied(self.proxied.unwrap_or(false));
        if let Some(ttl) = self.ttl {
            record = record.with_ttl(ttl);
        }
        record.priority = self.priority;
        Some(RecordMetadata {
            id: self.id,
            record,
        })
    }
}

/// Body of `POST /zones/{zone}/email/routing/enable`
#[derive(Debug, Serialize)]
pub struct EnableRoutingRequest {
    pub enabled: bool,
}

/// Body of `POST /accounts/{account}/email/routing/addresses`
#[derive(Debug, Serialize)]
pub struct DestinationRequest<'a> {
    pub email: &'a str,
}

/// Body of `POST /accounts/{account}/pages/projects/{project}/domains`
#[derive(Debug, Serialize)]
pub struct CustomDomainRequest<'a> {
    pub name: &'a str,
}

/// Destination address as listed by the account
#[derive(Debug, Deserialize)]
pub struct CloudflareDestination {
    pub email: String,
    /// Timestamp of verification, absent until the owner confirms
    #[serde(default)]
    pub verified: Option<String>,
}
