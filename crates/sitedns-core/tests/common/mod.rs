//! Test doubles and common utilities for contract tests
//!
//! [`MockSiteProvider`] behaves like a small in-memory provider: creates are
//! recorded by identity and a second create of the same identity answers
//! "already exists". Individual records, rules and domains can be scripted to
//! fail, as can the routing enable and destination calls, zone lookups and
//! every listing.

#![allow(dead_code)]

use sitedns_core::error::{ApiMessage, Error, Result};
use sitedns_core::traits::{
    DestinationAddress, DnsProvider, DnsRecord, DomainBinding, EmailRouting, ErrorClassifier,
    RecordIdentity, RecordMetadata, RoutingRule, RuleMatcher, Zone,
};
use sitedns_core::{EngineConfig, ReconcileEvent, RunState};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Scripted failure for one record name, rule address or domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Provider rejects the payload
    InvalidContent,
    /// Credentials rejected
    Auth,
    /// Transport-level failure
    Network,
    /// Provider error without a recognisable code
    Generic,
}

impl Failure {
    fn to_error(self) -> Error {
        match self {
            Failure::InvalidContent => Error::api(
                "mock",
                vec![ApiMessage::with_code(9005, "Content for CNAME record is invalid.")],
            ),
            Failure::Auth => Error::auth("Authentication error"),
            Failure::Network => Error::http("connection reset"),
            Failure::Generic => Error::api(
                "mock",
                vec![ApiMessage::new("An unknown error has occurred")],
            ),
        }
    }
}

/// A provider double that tracks calls
#[derive(Clone)]
pub struct MockSiteProvider {
    zones: Vec<Zone>,
    /// Identities created so far
    created: Arc<Mutex<HashSet<RecordIdentity>>>,
    /// Call counter for create_record()
    create_call_count: Arc<AtomicUsize>,
    /// Creates that returned (after any delay)
    completed_creates: Arc<AtomicUsize>,
    /// Creates currently in flight
    in_flight: Arc<AtomicUsize>,
    /// Highest in-flight count observed
    max_in_flight: Arc<AtomicUsize>,
    /// Per-record-name scripted failures
    record_failures: Arc<Mutex<HashMap<String, Failure>>>,
    /// Delay applied before each create is processed
    create_delay: Option<Duration>,
    /// Routing calls in order, e.g. "enable", "rule hello@example.test"
    routing_calls: Arc<Mutex<Vec<String>>>,
    /// Rule addresses (or "*" for catch-all) that fail
    rule_failures: Arc<Mutex<HashMap<String, Failure>>>,
    /// Rules created so far
    rules: Arc<Mutex<Vec<RoutingRule>>>,
    /// Destination addresses registered so far
    destinations: Arc<Mutex<Vec<String>>>,
    /// Scripted failure for enable_routing()
    enable_failure: Arc<Mutex<Option<Failure>>>,
    /// Scripted failure for add_destination()
    destination_failure: Arc<Mutex<Option<Failure>>>,
    /// Scripted failure for find_zone()
    lookup_failure: Arc<Mutex<Option<Failure>>>,
    /// Scripted failure for list_records(), list_rules() and list_destinations()
    listing_failure: Arc<Mutex<Option<Failure>>>,
    /// Domains bound so far
    bound: Arc<Mutex<HashSet<String>>>,
    /// Call counter for add_custom_domain()
    bind_call_count: Arc<AtomicUsize>,
}

impl MockSiteProvider {
    /// Provider holding one zone per name, with IDs Z1, Z2, ...
    pub fn with_zones(names: &[&str]) -> Self {
        let zones = names
            .iter()
            .enumerate()
            .map(|(i, name)| Zone::new(format!("Z{}", i + 1), *name))
            .collect();
        Self {
            zones,
            created: Arc::new(Mutex::new(HashSet::new())),
            create_call_count: Arc::new(AtomicUsize::new(0)),
            completed_creates: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            record_failures: Arc::new(Mutex::new(HashMap::new())),
            create_delay: None,
            routing_calls: Arc::new(Mutex::new(Vec::new())),
            rule_failures: Arc::new(Mutex::new(HashMap::new())),
            rules: Arc::new(Mutex::new(Vec::new())),
            destinations: Arc::new(Mutex::new(Vec::new())),
            enable_failure: Arc::new(Mutex::new(None)),
            destination_failure: Arc::new(Mutex::new(None)),
            lookup_failure: Arc::new(Mutex::new(None)),
            listing_failure: Arc::new(Mutex::new(None)),
            bound: Arc::new(Mutex::new(HashSet::new())),
            bind_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before each create is processed
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Make creates for `name` fail
    pub fn fail_record(&self, name: &str, failure: Failure) {
        self.record_failures
            .lock()
            .unwrap()
            .insert(name.to_string(), failure);
    }

    /// Make the rule for `address` fail ("*" for the catch-all)
    pub fn fail_rule(&self, address: &str, failure: Failure) {
        self.rule_failures
            .lock()
            .unwrap()
            .insert(address.to_string(), failure);
    }

    /// Make enable_routing() fail
    pub fn fail_enable(&self, failure: Failure) {
        *self.enable_failure.lock().unwrap() = Some(failure);
    }

    /// Make add_destination() fail
    pub fn fail_destination(&self, failure: Failure) {
        *self.destination_failure.lock().unwrap() = Some(failure);
    }

    /// Pretend `email` is already a registered destination
    pub fn mark_destination(&self, email: &str) {
        self.destinations.lock().unwrap().push(email.to_string());
    }

    /// Make find_zone() fail
    pub fn fail_lookups(&self, failure: Failure) {
        *self.lookup_failure.lock().unwrap() = Some(failure);
    }

    /// Make every listing call fail
    pub fn fail_listings(&self, failure: Failure) {
        *self.listing_failure.lock().unwrap() = Some(failure);
    }

    fn scripted(slot: &Mutex<Option<Failure>>) -> Result<()> {
        match *slot.lock().unwrap() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    /// Pretend `domain` is already bound
    pub fn mark_bound(&self, domain: &str) {
        self.bound.lock().unwrap().insert(domain.to_string());
    }

    /// Get the number of times create_record() was called
    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of creates that ran to completion
    pub fn completed_creates(&self) -> usize {
        self.completed_creates.load(Ordering::SeqCst)
    }

    /// Get the highest number of creates observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Distinct identities created at the provider
    pub fn created_identities(&self) -> HashSet<RecordIdentity> {
        self.created.lock().unwrap().clone()
    }

    /// Routing calls in the order they were made
    pub fn routing_calls(&self) -> Vec<String> {
        self.routing_calls.lock().unwrap().clone()
    }

    /// Get the number of times add_custom_domain() was called
    pub fn bind_call_count(&self) -> usize {
        self.bind_call_count.load(Ordering::SeqCst)
    }

    fn rule_address(rule: &RoutingRule) -> String {
        rule.matchers
            .iter()
            .find_map(|m| match m {
                RuleMatcher::Literal { value, .. } => Some(value.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "*".to_string())
    }
}

fn already_exists() -> Error {
    Error::api(
        "mock",
        vec![ApiMessage::with_code(81057, "Record already exists.")],
    )
}

impl ErrorClassifier for MockSiteProvider {}

#[async_trait::async_trait]
impl DnsProvider for MockSiteProvider {
    async fn find_zone(&self, domain: &str) -> Result<Option<Zone>> {
        Self::scripted(&self.lookup_failure)?;
        Ok(self.zones.iter().find(|z| z.name == domain).cloned())
    }

    async fn list_records(&self, _zone_id: &str) -> Result<Vec<RecordMetadata>> {
        Self::scripted(&self.listing_failure)?;
        let created = self.created.lock().unwrap();
        Ok(created
            .iter()
            .enumerate()
            .map(|(i, (record_type, name, content))| RecordMetadata {
                id: format!("rec-{}", i),
                record: DnsRecord::new(*record_type, name.clone(), content.clone()),
            })
            .collect())
    }

    async fn create_record(&self, _zone_id: &str, record: &DnsRecord) -> Result<()> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed_creates.fetch_add(1, Ordering::SeqCst);

        let failure = self.record_failures.lock().unwrap().get(&record.name).copied();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }

        if self.created.lock().unwrap().insert(record.identity()) {
            Ok(())
        } else {
            Err(already_exists())
        }
    }

    async fn update_record(&self, _zone_id: &str, _record_id: &str, _record: &DnsRecord) -> Result<()> {
        Ok(())
    }

    async fn delete_record(&self, _zone_id: &str, _record_id: &str) -> Result<()> {
        Ok(())
    }

    fn supports_record(&self, _record: &DnsRecord) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[async_trait::async_trait]
impl EmailRouting for MockSiteProvider {
    async fn enable_routing(&self, _zone_id: &str) -> Result<()> {
        self.routing_calls.lock().unwrap().push("enable".to_string());
        Self::scripted(&self.enable_failure)
    }

    async fn add_destination(&self, email: &str) -> Result<()> {
        self.routing_calls
            .lock()
            .unwrap()
            .push(format!("destination {}", email));
        Self::scripted(&self.destination_failure)?;

        let mut destinations = self.destinations.lock().unwrap();
        if destinations.iter().any(|d| d == email) {
            return Err(Error::api(
                "mock",
                vec![ApiMessage::new("Destination address already exists.")],
            ));
        }
        destinations.push(email.to_string());
        Ok(())
    }

    async fn create_rule(&self, _zone_id: &str, rule: &RoutingRule) -> Result<()> {
        let address = Self::rule_address(rule);
        self.routing_calls
            .lock()
            .unwrap()
            .push(format!("rule {}", address));

        let failure = self.rule_failures.lock().unwrap().get(&address).copied();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }
        self.rules.lock().unwrap().push(rule.clone());
        Ok(())
    }

    async fn list_rules(&self, _zone_id: &str) -> Result<Vec<RoutingRule>> {
        Self::scripted(&self.listing_failure)?;
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn list_destinations(&self) -> Result<Vec<DestinationAddress>> {
        Self::scripted(&self.listing_failure)?;
        Ok(self
            .destinations
            .lock()
            .unwrap()
            .iter()
            .map(|email| DestinationAddress {
                email: email.clone(),
                verified: true,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl DomainBinding for MockSiteProvider {
    async fn add_custom_domain(&self, _project: &str, domain: &str) -> Result<()> {
        self.bind_call_count.fetch_add(1, Ordering::SeqCst);
        if self.bound.lock().unwrap().insert(domain.to_string()) {
            Ok(())
        } else {
            Err(Error::api(
                "mock",
                vec![ApiMessage::new("Domain is already linked to this project")],
            ))
        }
    }
}

/// Engine config for tests
pub fn engine_config(concurrency: usize) -> EngineConfig {
    EngineConfig {
        concurrency,
        event_channel_capacity: 256,
        bind_on_partial_dns: false,
    }
}

/// Drain every event already sent on the channel
pub fn drain_events(rx: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// The target states of every state change, in order
pub fn state_path(events: &[ReconcileEvent]) -> Vec<RunState> {
    events
        .iter()
        .filter_map(|e| match e {
            ReconcileEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}
