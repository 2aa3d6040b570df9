//! Core reconciliation engine
//!
//! The [`Reconciler`] is responsible for:
//! - Resolving the zone for a domain
//! - Creating the planned records (concurrently, idempotently)
//! - Configuring email routing (sequentially, best-effort)
//! - Binding custom domains at the hosting platform
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────────────┐
//!  ReconciliationPlan ─▶      Reconciler      │─── ReconcileEvent ──▶ observers
//!                      └──────────────────────┘
//!                                 │
//!         ┌───────────────────────┼────────────────────────┐
//!         ▼                       ▼                        ▼
//!  ┌─────────────┐        ┌──────────────┐         ┌───────────────┐
//!  │ DnsProvider │        │ EmailRouting │         │ DomainBinding │
//!  └─────────────┘        └──────────────┘         └───────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. `Idle → ZoneResolved` (or `Idle → Aborted` when the zone is missing)
//! 2. Batch records concurrently, then mail records in order → `RecordsSubmitted`
//! 3. Email routing sweep → `RoutingConfigured`
//! 4. Custom domains, only if the batch fully succeeded → `DomainsBound`
//! 5. `Done`
//!
//! A fatal failure in the record batch (rejected credentials) skips the
//! mutating work of steps 2 to 4; the states are still walked.
//!
//! No component raises past its boundary: every step yields an outcome value
//! and the caller decides what to do with it.

mod batch;

pub use batch::{classify_result, upsert_record};

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::plan::{BindingPlan, ReconciliationPlan, RoutingPlan};
use crate::report::{
    AuditReport, BindOutcome, ReconciliationResult, RoutingOutcome, RoutingStatus, RoutingStep,
    RunReport, RunState, UpsertOutcome,
};
use crate::traits::{DestinationAddress, DnsRecord, RecordMetadata, RoutingRule, SiteProvider, Zone};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// The run moved to a new state
    StateChanged {
        from: RunState,
        to: RunState,
    },

    /// A record creation finished
    RecordApplied {
        name: String,
        success: bool,
    },

    /// A routing step finished
    RoutingStepApplied {
        step: RoutingStep,
        success: bool,
    },

    /// A custom-domain binding finished
    DomainBound {
        domain: String,
        success: bool,
    },
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run()`] with a plan, or drive the individual
///    operations yourself
/// 3. Drop when done; no state outlives a run
///
/// ## Threading
///
/// Everything runs on the calling task except [`Reconciler::create_all`],
/// which fans out over a bounded set of spawned tasks.
pub struct Reconciler {
    /// Provider for DNS, routing and domain binding
    provider: Arc<dyn SiteProvider>,

    /// Maximum record creations in flight
    concurrency: usize,

    /// Bind domains even when the record batch partly failed
    bind_on_partial_dns: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        provider: Arc<dyn SiteProvider>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            provider,
            concurrency: config.concurrency,
            bind_on_partial_dns: config.bind_on_partial_dns,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Resolve the zone for `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Zone)`: First zone whose name matches exactly
    /// - `Err(Error::NotFound)`: No such zone, or the lookup failed
    pub async fn resolve_zone(&self, domain: &str) -> Result<Zone> {
        match self.provider.find_zone(domain).await {
            Ok(Some(zone)) => {
                info!("Zone for {}: {}", domain, zone.id);
                Ok(zone)
            }
            Ok(None) => {
                error!("Could not find zone for {}", domain);
                Err(Error::not_found(format!("zone for {}", domain)))
            }
            Err(e) => {
                error!("Zone lookup for {} failed: {}", domain, e);
                Err(Error::not_found(format!("zone for {} ({})", domain, e)))
            }
        }
    }

    /// List every record in a zone
    ///
    /// Fails soft: on error the failure is logged and an empty list returned.
    pub async fn list_records(&self, zone: &Zone) -> Vec<RecordMetadata> {
        match self.provider.list_records(&zone.id).await {
            Ok(records) => {
                debug!("Zone {} holds {} record(s)", zone.name, records.len());
                records
            }
            Err(e) => {
                error!("Listing records for {} failed: {}", zone.name, e);
                Vec::new()
            }
        }
    }

    /// Create one record, treating "already exists" as success
    pub async fn upsert(&self, zone: &Zone, record: &DnsRecord) -> UpsertOutcome {
        upsert_record(self.provider.as_ref(), zone, record).await
    }

    /// Create every record concurrently and join the outcomes by name
    ///
    /// Names must be unique within `records`. An authentication failure
    /// aborts records still in flight; they come back as
    /// [`UpsertOutcome::Cancelled`].
    pub async fn create_all(
        &self,
        zone: &Zone,
        records: &[DnsRecord],
    ) -> Result<ReconciliationResult> {
        let result =
            batch::create_all(Arc::clone(&self.provider), zone, records, self.concurrency).await?;

        for (name, outcome) in result.outcomes() {
            self.emit_event(ReconcileEvent::RecordApplied {
                name: name.clone(),
                success: outcome.is_success(),
            });
        }

        info!("DNS setup: {} records created", result.summary());
        Ok(result)
    }

    /// Create records one after another, in order
    ///
    /// Used for record sets sharing a name (MX triplet, SPF) where a
    /// name-keyed result would collide.
    pub async fn apply_mail_records(
        &self,
        zone: &Zone,
        records: &[DnsRecord],
    ) -> Vec<(DnsRecord, UpsertOutcome)> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let outcome = self.upsert(zone, record).await;
            self.emit_event(ReconcileEvent::RecordApplied {
                name: record.name.clone(),
                success: outcome.is_success(),
            });
            outcomes.push((record.clone(), outcome));
        }
        outcomes
    }

    /// Configure email routing for the zone
    ///
    /// Strict order: enable → destination → catch-all → one rule per alias.
    /// A failed step never skips the ones after it.
    pub async fn configure_routing(&self, zone: &Zone, plan: &RoutingPlan) -> RoutingOutcome {
        let mut outcome = RoutingOutcome::default();
        let domain = zone.name.as_str();

        let enabled = self.provider.enable_routing(&zone.id).await;
        self.record_step(&mut outcome, RoutingStep::Enable, enabled);

        let destination = self.provider.add_destination(&plan.notify_address).await;
        if destination.is_ok() {
            warn!(
                "Check {} for the verification email",
                plan.notify_address
            );
        }
        self.record_step(
            &mut outcome,
            RoutingStep::Destination(plan.notify_address.clone()),
            destination,
        );

        let catch_all = self
            .provider
            .create_rule(&zone.id, &plan.catch_all_rule(domain))
            .await;
        self.record_step(&mut outcome, RoutingStep::CatchAll, catch_all);

        for (address, rule) in plan.alias_rules(domain) {
            let created = self.provider.create_rule(&zone.id, &rule).await;
            self.record_step(&mut outcome, RoutingStep::Alias(address), created);
        }

        match outcome.status() {
            RoutingStatus::Success => info!(
                "Email routing complete: *@{} -> {}",
                domain, plan.notify_address
            ),
            RoutingStatus::PartialFailure => warn!(
                "Email routing partially failed: {} of {} step(s) failed",
                outcome.failures().len(),
                outcome.attempted()
            ),
        }

        outcome
    }

    fn record_step(
        &self,
        outcome: &mut RoutingOutcome,
        step: RoutingStep,
        result: std::result::Result<(), Error>,
    ) {
        let step_outcome = classify_result(self.provider.as_ref(), result);
        match &step_outcome {
            UpsertOutcome::Created => info!("[ok] {}", step),
            UpsertOutcome::AlreadyExists => info!("[exists] {}", step),
            other => error!("[failed] {}: {}", step, other),
        }
        self.emit_event(ReconcileEvent::RoutingStepApplied {
            step: step.clone(),
            success: step_outcome.is_success(),
        });
        outcome.steps.push((step, step_outcome));
    }

    /// Attach a custom domain to a hosting project
    ///
    /// Callers should only invoke this once the domain's records exist;
    /// this method does not check.
    pub async fn bind_domain(&self, project: &str, domain: &str) -> BindOutcome {
        let result = self.provider.add_custom_domain(project, domain).await;
        let outcome = match classify_result(self.provider.as_ref(), result) {
            UpsertOutcome::Created => {
                info!("[bound] {} -> project {}", domain, project);
                BindOutcome::Bound
            }
            UpsertOutcome::AlreadyExists => {
                info!("[exists] domain already linked: {}", domain);
                BindOutcome::AlreadyBound
            }
            UpsertOutcome::Failed { kind, reason, .. } => {
                error!("[failed] binding {}: {}", domain, reason);
                BindOutcome::Failed { kind, reason }
            }
            UpsertOutcome::Cancelled => BindOutcome::Skipped,
        };

        self.emit_event(ReconcileEvent::DomainBound {
            domain: domain.to_string(),
            success: outcome.is_success(),
        });
        outcome
    }

    /// List routing rules; fails soft
    pub async fn list_routing_rules(&self, zone: &Zone) -> Vec<RoutingRule> {
        self.provider.list_rules(&zone.id).await.unwrap_or_else(|e| {
            error!("Listing routing rules for {} failed: {}", zone.name, e);
            Vec::new()
        })
    }

    /// List destination addresses; fails soft
    pub async fn list_destinations(&self) -> Vec<DestinationAddress> {
        self.provider.list_destinations().await.unwrap_or_else(|e| {
            error!("Listing destination addresses failed: {}", e);
            Vec::new()
        })
    }

    /// Compare the plan's records with what the zone holds
    ///
    /// Read-only; nothing is created or deleted.
    pub async fn audit(&self, zone: &Zone, plan: &ReconciliationPlan) -> AuditReport {
        let existing = self.list_records(zone).await;
        let existing_ids: HashSet<_> = existing.iter().map(|m| m.record.identity()).collect();
        let planned_ids: HashSet<_> = plan.identities().into_iter().collect();
        let planned_slots: HashSet<_> = plan
            .records
            .iter()
            .chain(plan.mail_records.iter())
            .map(|r| (r.record_type, r.name.to_ascii_lowercase()))
            .collect();

        let mut report = AuditReport::default();
        for record in plan.records.iter().chain(plan.mail_records.iter()) {
            if existing_ids.contains(&record.identity()) {
                report.present.push(record.clone());
            } else {
                report.missing.push(record.clone());
            }
        }
        for meta in existing {
            let identity = meta.record.identity();
            // Same name and type as a planned record, different content
            let slot = (identity.0, identity.1.clone());
            if planned_slots.contains(&slot) && !planned_ids.contains(&identity) {
                report.conflicting.push(meta.record);
            }
        }

        report
    }

    /// Run the full reconciliation for a plan
    ///
    /// Never fails: every outcome is collected in the returned report, whose
    /// [`RunReport::is_success`] tells whether everything requested succeeded.
    pub async fn run(&self, plan: &ReconciliationPlan) -> RunReport {
        let mut report = RunReport::new(&plan.domain);
        info!("Setting up DNS for {}", plan.domain);

        let zone = match self.resolve_zone(&plan.domain).await {
            Ok(zone) => zone,
            Err(_) => {
                self.transition(&mut report, RunState::Aborted);
                report.finished_at = chrono::Utc::now();
                return report;
            }
        };
        report.set_zone(&zone);
        self.transition(&mut report, RunState::ZoneResolved);

        match self.create_all(&zone, &plan.records).await {
            Ok(result) => report.records = result,
            Err(e) => {
                error!("Record batch rejected: {}", e);
                for record in &plan.records {
                    report.records.insert(
                        record.name.clone(),
                        UpsertOutcome::Failed {
                            kind: ErrorKind::Provider,
                            reason: e.to_string(),
                            messages: Vec::new(),
                        },
                    );
                }
            }
        }

        // Later stages would reuse the rejected credentials
        let fatal = report.records.fatal_kind();
        if let Some(kind) = fatal {
            warn!(
                "Record batch hit a fatal {} failure; skipping mail records, routing and binding",
                kind
            );
        }

        if !plan.mail_records.is_empty() {
            if fatal.is_some() {
                report.mail_records = plan
                    .mail_records
                    .iter()
                    .map(|record| (record.clone(), UpsertOutcome::Cancelled))
                    .collect();
            } else {
                info!("Setting up email DNS records for {}", plan.domain);
                report.mail_records = self.apply_mail_records(&zone, &plan.mail_records).await;
            }
        }
        self.transition(&mut report, RunState::RecordsSubmitted);

        if let Some(routing) = &plan.routing {
            if fatal.is_none() {
                report.routing = Some(self.configure_routing(&zone, routing).await);
            }
        }
        self.transition(&mut report, RunState::RoutingConfigured);

        if let Some(binding) = &plan.binding {
            if fatal.is_some() {
                for domain in &binding.domains {
                    report.bindings.insert(domain.clone(), BindOutcome::Skipped);
                }
            } else {
                self.bind_all(&mut report, binding).await;
            }
        }
        self.transition(&mut report, RunState::DomainsBound);

        self.transition(&mut report, RunState::Done);
        report.finished_at = chrono::Utc::now();
        info!(
            "Reconciliation of {} finished: {} record(s), {} failure(s)",
            plan.domain,
            report.records.summary(),
            report.failure_count()
        );
        report
    }

    async fn bind_all(&self, report: &mut RunReport, binding: &BindingPlan) {
        let dns_ready = report.records.all_succeeded();
        if !dns_ready && !self.bind_on_partial_dns {
            warn!(
                "Skipping custom domains for {}: DNS setup incomplete ({})",
                binding.project,
                report.records.summary()
            );
            for domain in &binding.domains {
                report.bindings.insert(domain.clone(), BindOutcome::Skipped);
            }
            return;
        }

        for domain in &binding.domains {
            let outcome = self.bind_domain(&binding.project, domain).await;
            report.bindings.insert(domain.clone(), outcome);
        }
    }

    fn transition(&self, report: &mut RunReport, to: RunState) {
        let from = report.state;
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        debug!("Run state: {} -> {}", from, to);
        report.state = to;
        self.emit_event(ReconcileEvent::StateChanged { from, to });
    }

    /// Emit an engine event
    fn emit_event(&self, event: ReconcileEvent) {
        // Send event, logging warning if channel is full (backpressure)
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
