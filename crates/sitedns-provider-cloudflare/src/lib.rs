// # Cloudflare Provider
//
// This crate provides the Cloudflare implementation of the sitedns provider
// traits: zone lookup and DNS records, Email Routing, and Pages custom
// domains.
//
// ## Behavior
//
// - One HTTP request per trait call (record listing follows pagination)
// - No retry, backoff or caching; sequencing and concurrency belong to the
//   `Reconciler`
// - HTTP timeout of 30 seconds on every request
// - Status codes and Cloudflare error codes are mapped onto `sitedns_core::Error`
//   and classified through `ErrorClassifier`
// - Dry-run mode: GET requests are performed, mutating requests are logged
//   with their payload and reported as successful
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or `Debug` output
// - Credentials come from configuration built once at startup
// - Construction fails fast if a credential is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - DNS Records: GET/POST `/zones/:zone_id/dns_records`,
//   PUT/DELETE `/zones/:zone_id/dns_records/:record_id`
// - Email Routing: POST `/zones/:zone_id/email/routing/enable`,
//   GET/POST `/zones/:zone_id/email/routing/rules`,
//   GET/POST `/accounts/:account_id/email/routing/addresses`
// - Pages: POST `/accounts/:account_id/pages/projects/:project/domains`

mod types;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use sitedns_core::config::ProviderConfig;
use sitedns_core::traits::{
    DestinationAddress, DnsProvider, DnsRecord, DomainBinding, EmailRouting, ErrorClassifier,
    RecordMetadata, RecordType, RoutingRule, SiteProvider, SiteProviderFactory, Zone,
    default_classification,
};
use sitedns_core::{ApiMessage, Error, ErrorKind, Result};
use std::sync::Arc;
use std::time::Duration;

use types::{
    CloudflareDestination, CloudflareDnsRecord, CloudflareResponse, CloudflareZone,
    CustomDomainRequest, DestinationRequest, EnableRoutingRequest,
};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for record listing (API maximum is 5000, default 100)
const RECORDS_PER_PAGE: u32 = 100;

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare provider
///
/// Authenticates with the global API key header pair (`X-Auth-Email`,
/// `X-Auth-Key`). Account-scoped calls (routing addresses, Pages) use the
/// configured account ID.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, listings)
/// - Log the intended POST/PUT/DELETE with its payload
/// - **NOT** actually modify anything
pub struct CloudflareProvider {
    /// Account email sent as `X-Auth-Email`
    email: String,

    /// Global API key sent as `X-Auth-Key`
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Account ID for account-scoped endpoints
    account_id: String,

    /// Zone ID (optional, looked up by domain when absent)
    zone_id: Option<String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip mutations
    dry_run: bool,

    /// API root, overridable for tests
    base_url: String,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("email", &self.email)
            .field("api_key", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("zone_id", &self.zone_id)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `email`: Account email
    /// - `api_key`: Global API key
    /// - `account_id`: Account ID
    /// - `zone_id`: Optional zone ID (looked up by domain when `None`)
    /// - `dry_run`: If true, perform GET requests but skip mutations
    ///
    /// # Errors
    ///
    /// `Error::Config` if a credential is empty, `Error::Http` if the HTTP
    /// client cannot be built.
    pub fn new(
        email: impl Into<String>,
        api_key: impl Into<String>,
        account_id: impl Into<String>,
        zone_id: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let email = email.into();
        let api_key = api_key.into();
        let account_id = account_id.into();

        if email.is_empty() {
            return Err(Error::config("Cloudflare account email cannot be empty"));
        }
        if api_key.is_empty() {
            return Err(Error::config("Cloudflare API key cannot be empty"));
        }
        if account_id.is_empty() {
            return Err(Error::config("Cloudflare account ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            email,
            api_key,
            account_id,
            zone_id,
            client,
            dry_run,
            base_url: CLOUDFLARE_API_BASE.to_string(),
        })
    }

    /// Point the provider at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether mutations are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("X-Auth-Email", &self.email)
            .header("X-Auth-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<CloudflareResponse<T>> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        tracing::debug!("Response status: {}", status);
        parse_response(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<CloudflareResponse<T>> {
        tracing::debug!("GET {}", self.url(path));
        self.send(self.request(Method::GET, path)).await
    }

    /// Send a mutating request, or log it in dry-run mode
    async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send {} request to {} with payload: {}",
                method,
                self.url(path),
                body.as_ref().map(ToString::to_string).unwrap_or_default()
            );
            return Ok(());
        }

        tracing::debug!("{} {}", method, self.url(path));
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        self.send::<serde_json::Value>(builder).await?;
        Ok(())
    }
}

/// Decode a response body, mapping failures onto `Error`
///
/// A body with `success: false` keeps its error entries (code and message)
/// so that classification can inspect them.
pub(crate) fn parse_response<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<CloudflareResponse<T>> {
    match serde_json::from_str::<CloudflareResponse<T>>(body) {
        Ok(response) if response.success => Ok(response),
        Ok(response) => {
            let messages = response.errors.into_iter().map(ApiMessage::from).collect();
            Err(status_error(status, messages))
        }
        Err(e) if (200..300).contains(&status) => {
            Err(Error::http(format!("Failed to parse response: {}", e)))
        }
        Err(_) => Err(status_error(
            status,
            vec![ApiMessage::new(format!("HTTP {}", status))],
        )),
    }
}

fn status_error(status: u16, messages: Vec<ApiMessage>) -> Error {
    let kind = match status {
        401 | 403 => ErrorKind::Authentication,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::Transport,
        _ => return Error::api(PROVIDER_NAME, messages),
    };
    Error::status(PROVIDER_NAME, status, kind, messages)
}

/// Map a Cloudflare error code to a failure kind, when the code is decisive
fn classify_code(code: i64) -> Option<ErrorKind> {
    match code {
        // An identical record already exists / conflicting record
        81053..=81058 => Some(ErrorKind::AlreadyExists),
        // Invalid or missing credentials
        6003 | 6103 | 6111 | 9103 | 9106 | 9109 | 10000 => Some(ErrorKind::Authentication),
        // Record, zone or route not found
        7000 | 7003 | 81044 => Some(ErrorKind::NotFound),
        // Throttled
        971 => Some(ErrorKind::RateLimited),
        _ => None,
    }
}

impl ErrorClassifier for CloudflareProvider {
    fn classify_error(&self, error: &Error) -> ErrorKind {
        error
            .api_messages()
            .iter()
            .find_map(|m| m.code.and_then(classify_code))
            .unwrap_or_else(|| default_classification(error))
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Find the zone named exactly `domain`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// ```
    async fn find_zone(&self, domain: &str) -> Result<Option<Zone>> {
        // If zone_id is pre-configured, use it
        if let Some(ref zone_id) = self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(Some(Zone::new(zone_id.clone(), domain)));
        }

        tracing::debug!("Looking up zone for domain: {}", domain);
        let response: CloudflareResponse<Vec<CloudflareZone>> =
            self.get(&format!("/zones?name={}", domain)).await?;

        Ok(response
            .result
            .unwrap_or_default()
            .into_iter()
            .find(|zone| zone.name.eq_ignore_ascii_case(domain))
            .map(|zone| Zone::new(zone.id, zone.name)))
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordMetadata>> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let response: CloudflareResponse<Vec<CloudflareDnsRecord>> = self
                .get(&format!(
                    "/zones/{}/dns_records?page={}&per_page={}",
                    zone_id, page, RECORDS_PER_PAGE
                ))
                .await?;

            let batch = response.result.unwrap_or_default();
            let fetched = batch.len();
            let before = records.len();
            records.extend(batch.into_iter().filter_map(CloudflareDnsRecord::into_metadata));
            let skipped = fetched - (records.len() - before);
            if skipped > 0 {
                tracing::debug!("Skipped {} record(s) of unmodelled types", skipped);
            }

            let more = match response.result_info.and_then(|info| info.total_pages) {
                Some(total_pages) => page < total_pages,
                None => fetched as u32 == RECORDS_PER_PAGE,
            };
            if !more {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    /// Create a record
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "CNAME", "name": "...", "content": "...", "proxied": true, "ttl": 1}
    /// ```
    async fn create_record(&self, zone_id: &str, record: &DnsRecord) -> Result<()> {
        let payload = serde_json::to_value(record)?;
        self.mutate(
            Method::POST,
            &format!("/zones/{}/dns_records", zone_id),
            Some(payload),
        )
        .await
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, record: &DnsRecord) -> Result<()> {
        let payload = serde_json::to_value(record)?;
        self.mutate(
            Method::PUT,
            &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            Some(payload),
        )
        .await?;
        tracing::info!("DNS record updated: {}", record);
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.mutate(
            Method::DELETE,
            &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            None,
        )
        .await?;
        tracing::info!("DNS record deleted: {}", record_id);
        Ok(())
    }

    fn supports_record(&self, record: &DnsRecord) -> bool {
        // Only address and alias records can be proxied
        let proxiable = matches!(
            record.record_type,
            RecordType::A | RecordType::Aaaa | RecordType::Cname
        );
        !record.name.is_empty() && record.name.len() <= 253 && (proxiable || !record.proxied)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl EmailRouting for CloudflareProvider {
    async fn enable_routing(&self, zone_id: &str) -> Result<()> {
        let payload = serde_json::to_value(EnableRoutingRequest { enabled: true })?;
        self.mutate(
            Method::POST,
            &format!("/zones/{}/email/routing/enable", zone_id),
            Some(payload),
        )
        .await
    }

    async fn add_destination(&self, email: &str) -> Result<()> {
        let payload = serde_json::to_value(DestinationRequest { email })?;
        self.mutate(
            Method::POST,
            &format!("/accounts/{}/email/routing/addresses", self.account_id),
            Some(payload),
        )
        .await
    }

    async fn create_rule(&self, zone_id: &str, rule: &RoutingRule) -> Result<()> {
        let payload = serde_json::to_value(rule)?;
        self.mutate(
            Method::POST,
            &format!("/zones/{}/email/routing/rules", zone_id),
            Some(payload),
        )
        .await
    }

    async fn list_rules(&self, zone_id: &str) -> Result<Vec<RoutingRule>> {
        let response: CloudflareResponse<Vec<RoutingRule>> = self
            .get(&format!("/zones/{}/email/routing/rules?per_page=50", zone_id))
            .await?;
        Ok(response.result.unwrap_or_default())
    }

    async fn list_destinations(&self) -> Result<Vec<DestinationAddress>> {
        let response: CloudflareResponse<Vec<CloudflareDestination>> = self
            .get(&format!(
                "/accounts/{}/email/routing/addresses",
                self.account_id
            ))
            .await?;
        Ok(response
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|d| DestinationAddress {
                email: d.email,
                verified: d.verified.is_some(),
            })
            .collect())
    }
}

#[async_trait]
impl DomainBinding for CloudflareProvider {
    async fn add_custom_domain(&self, project: &str, domain: &str) -> Result<()> {
        let payload = serde_json::to_value(CustomDomainRequest { name: domain })?;
        self.mutate(
            Method::POST,
            &format!(
                "/accounts/{}/pages/projects/{}/domains",
                self.account_id, project
            ),
            Some(payload),
        )
        .await
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl SiteProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn SiteProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                email,
                api_key,
                account_id,
                zone_id,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Arc::new(CloudflareProvider::new(
                    email.clone(),
                    api_key.clone(),
                    account_id.clone(),
                    zone_id.clone(),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// This function should be called during initialization to make the
/// Cloudflare provider available.
///
/// # Example
///
/// ```rust
/// use sitedns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// sitedns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &sitedns_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dry_run: bool) -> CloudflareProvider {
        CloudflareProvider::new("ops@example.test", "secret_key_12345", "acct", None, dry_run)
            .unwrap()
            // Nothing listens here; a request that is actually sent fails
            .with_base_url("http://127.0.0.1:9")
    }

    fn cloudflare_config(api_key: &str) -> ProviderConfig {
        ProviderConfig::Cloudflare {
            email: "ops@example.test".to_string(),
            api_key: api_key.to_string(),
            account_id: "acct".to_string(),
            zone_id: Some("Z1".to_string()),
            dry_run: false,
        }
    }

    fn classify(status: u16, body: &str) -> ErrorKind {
        let err = parse_response::<serde_json::Value>(status, body).unwrap_err();
        provider(false).classify_error(&err)
    }

    #[test]
    fn test_factory_creation() {
        let provider = CloudflareFactory.create(&cloudflare_config("key"));
        assert!(provider.is_ok());
    }

    #[test]
    fn test_factory_missing_key() {
        let provider = CloudflareFactory.create(&cloudflare_config(""));
        assert!(matches!(provider, Err(Error::Config(_))));
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ProviderConfig::Custom {
            factory: "cloudflare".to_string(),
            config: serde_json::json!({}),
        };
        assert!(CloudflareFactory.create(&config).is_err());
    }

    #[test]
    fn test_register() {
        let registry = sitedns_core::ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_provider("cloudflare"));
        assert!(registry.create_provider(&cloudflare_config("key")).is_ok());
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let debug_str = format!("{:?}", provider(false));
        assert!(!debug_str.contains("secret_key"));
        assert!(debug_str.contains("<REDACTED>"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn test_already_exists_message_is_success_equivalent() {
        let body = r#"{"success":false,"errors":[{"message":"record already exists"}],"result":null}"#;
        assert_eq!(classify(400, body), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_already_exists_code() {
        let body = r#"{"success":false,"errors":[{"code":81057,"message":"Record exists."}]}"#;
        assert_eq!(classify(400, body), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_other_failure_keeps_message() {
        let body = r#"{"success":false,"errors":[{"message":"invalid content"}]}"#;
        let err = parse_response::<serde_json::Value>(400, body).unwrap_err();

        assert_eq!(provider(false).classify_error(&err), ErrorKind::Provider);
        assert_eq!(err.api_messages()[0].message, "invalid content");
        assert!(err.to_string().contains("invalid content"));
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"}]}"#;
        assert_eq!(classify(403, body), ErrorKind::Authentication);
        assert_eq!(classify(429, "rate limited"), ErrorKind::RateLimited);
        assert_eq!(classify(502, "<html>bad gateway</html>"), ErrorKind::Transport);
    }

    #[test]
    fn test_status_failure_keeps_raw_entries() {
        let body = r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"}]}"#;
        let err = parse_response::<serde_json::Value>(403, body).unwrap_err();

        assert!(matches!(err, Error::Status { status: 403, .. }));
        assert_eq!(err.api_messages(), &[ApiMessage::with_code(10000, "Authentication error")]);

        let outcome = sitedns_core::engine::classify_result(&provider(false), Err(err));
        match outcome {
            sitedns_core::UpsertOutcome::Failed { kind, messages, .. } => {
                assert_eq!(kind, ErrorKind::Authentication);
                assert_eq!(messages[0].code, Some(10000));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_auth_code_without_auth_status() {
        let body = r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}]}"#;
        assert_eq!(classify(400, body), ErrorKind::Authentication);
    }

    #[test]
    fn test_success_envelope() {
        let body = r#"{"success":true,"errors":[],"result":[{"id":"Z1","name":"example.test"}],"result_info":{"page":1,"total_pages":1}}"#;
        let response = parse_response::<Vec<CloudflareZone>>(200, body).unwrap();
        let zones = response.result.unwrap();
        assert_eq!(zones[0].id, "Z1");
        assert_eq!(response.result_info.unwrap().total_pages, Some(1));
    }

    #[test]
    fn test_record_conversion_skips_unmodelled_types() {
        let body = r#"[
            {"id":"r1","type":"MX","name":"example.test","content":"route1.mx.cloudflare.net","priority":69,"proxied":false,"ttl":1},
            {"id":"r2","type":"HTTPS","name":"example.test","content":"1 . alpn=h2"}
        ]"#;
        let raw: Vec<CloudflareDnsRecord> = serde_json::from_str(body).unwrap();
        let records: Vec<_> = raw.into_iter().filter_map(CloudflareDnsRecord::into_metadata).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].record.priority, Some(69));
        assert_eq!(records[0].record.record_type, RecordType::Mx);
    }

    #[test]
    fn test_supports_record() {
        let provider = provider(false);

        assert!(provider.supports_record(&DnsRecord::cname("example.test", "proj.pages.dev")));
        assert!(provider.supports_record(&DnsRecord::mx("example.test", "mx.test", 3)));
        assert!(!provider.supports_record(&DnsRecord::txt("example.test", "v=spf1").with_proxied(true)));
        assert!(!provider.supports_record(&DnsRecord::cname("a".repeat(254), "proj.pages.dev")));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(CloudflareProvider::new("", "key", "acct", None, false).is_err());
        assert!(CloudflareProvider::new("ops@example.test", "key", "", None, false).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_send() {
        let provider = provider(true);
        assert!(provider.is_dry_run());

        let record = DnsRecord::cname("example.test", "proj.pages.dev");
        assert!(provider.create_record("Z1", &record).await.is_ok());
        assert!(provider.update_record("Z1", "r1", &record).await.is_ok());
        assert!(provider.delete_record("Z1", "r1").await.is_ok());
        assert!(provider.add_custom_domain("proj", "example.test").await.is_ok());
    }

    #[tokio::test]
    async fn test_live_mode_surfaces_transport_errors() {
        let provider = provider(false);
        let err = provider
            .create_record("Z1", &DnsRecord::cname("example.test", "proj.pages.dev"))
            .await
            .unwrap_err();
        assert_eq!(provider.classify_error(&err), ErrorKind::Transport);

        let err = provider
            .update_record("Z1", "r1", &DnsRecord::cname("example.test", "proj.pages.dev"))
            .await
            .unwrap_err();
        assert_eq!(provider.classify_error(&err), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_zone_id_preconfigured() {
        let provider = CloudflareProvider::new(
            "ops@example.test",
            "key",
            "acct",
            Some("Z9".to_string()),
            false,
        )
        .unwrap()
        .with_base_url("http://127.0.0.1:9");

        let zone = provider.find_zone("example.test").await.unwrap();
        assert_eq!(zone, Some(Zone::new("Z9", "example.test")));
    }
}
