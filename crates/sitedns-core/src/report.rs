//! Outcomes produced by the reconciliation engine
//!
//! Every value here is created per invocation and discarded after being
//! printed or returned; nothing is persisted.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ApiMessage, ErrorKind};
use crate::traits::{DnsRecord, RecordIdentity, Zone};

/// Result of creating a single record (or routing object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// The provider created it
    Created,
    /// It was already there; success-equivalent
    AlreadyExists,
    /// The provider or transport reported a failure
    Failed {
        /// Classification of the failure
        kind: ErrorKind,
        /// Human-readable reason
        reason: String,
        /// Raw provider payload, for diagnostics
        messages: Vec<ApiMessage>,
    },
    /// Never attempted because the batch was cancelled by a fatal error
    Cancelled,
}

impl UpsertOutcome {
    /// Success or already-satisfied
    pub fn is_success(&self) -> bool {
        matches!(self, UpsertOutcome::Created | UpsertOutcome::AlreadyExists)
    }

    /// Failure classification, if this outcome is a failure
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            UpsertOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Status tag used in console output
    pub fn tag(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::AlreadyExists => "exists",
            UpsertOutcome::Failed { .. } => "failed",
            UpsertOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertOutcome::Failed { kind, reason, .. } => write!(f, "failed ({}): {}", kind, reason),
            other => f.write_str(other.tag()),
        }
    }
}

/// Outcome of a concurrent record batch, keyed by record name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    outcomes: BTreeMap<String, UpsertOutcome>,
}

impl ReconciliationResult {
    /// Empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for `name`, replacing any earlier entry
    pub fn insert(&mut self, name: impl Into<String>, outcome: UpsertOutcome) {
        self.outcomes.insert(name.into(), outcome);
    }

    /// Outcome for a record name
    pub fn get(&self, name: &str) -> Option<&UpsertOutcome> {
        self.outcomes.get(name)
    }

    /// Whether a name has an entry
    pub fn contains(&self, name: &str) -> bool {
        self.outcomes.contains_key(name)
    }

    /// All outcomes, ordered by name
    pub fn outcomes(&self) -> &BTreeMap<String, UpsertOutcome> {
        &self.outcomes
    }

    /// Name → success flag
    pub fn success_map(&self) -> BTreeMap<String, bool> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| (name.clone(), outcome.is_success()))
            .collect()
    }

    /// Number of successful (or already-present) records
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    /// Number of entries
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Every record succeeded
    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// First fatal failure kind in the batch, if any
    pub fn fatal_kind(&self) -> Option<ErrorKind> {
        self.outcomes
            .values()
            .filter_map(UpsertOutcome::error_kind)
            .find(ErrorKind::is_fatal)
    }

    /// Aggregate as `succeeded/total`
    pub fn summary(&self) -> String {
        format!("{}/{}", self.succeeded(), self.total())
    }
}

/// Which step of the routing sequence an outcome belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "target", rename_all = "snake_case")]
pub enum RoutingStep {
    /// Enable routing on the zone
    Enable,
    /// Register the destination address
    Destination(String),
    /// Catch-all rule
    CatchAll,
    /// Literal rule for one alias address
    Alias(String),
}

impl fmt::Display for RoutingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingStep::Enable => f.write_str("enable routing"),
            RoutingStep::Destination(email) => write!(f, "destination {}", email),
            RoutingStep::CatchAll => f.write_str("catch-all rule"),
            RoutingStep::Alias(address) => write!(f, "rule {}", address),
        }
    }
}

/// Overall status of the routing configurator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStatus {
    /// Every step succeeded or was already satisfied
    Success,
    /// At least one step failed
    PartialFailure,
}

/// Outcome of each routing step, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingOutcome {
    /// Steps in the order they were attempted
    pub steps: Vec<(RoutingStep, UpsertOutcome)>,
}

impl RoutingOutcome {
    /// Aggregate status
    pub fn status(&self) -> RoutingStatus {
        if self.steps.iter().all(|(_, outcome)| outcome.is_success()) {
            RoutingStatus::Success
        } else {
            RoutingStatus::PartialFailure
        }
    }

    /// Steps that failed
    pub fn failures(&self) -> Vec<&(RoutingStep, UpsertOutcome)> {
        self.steps
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .collect()
    }

    /// Number of steps attempted
    pub fn attempted(&self) -> usize {
        self.steps.len()
    }
}

/// Outcome of attaching a custom domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BindOutcome {
    /// Newly attached
    Bound,
    /// Was already attached; success-equivalent
    AlreadyBound,
    /// The platform refused or the call failed
    Failed {
        /// Classification of the failure
        kind: ErrorKind,
        /// Human-readable reason
        reason: String,
    },
    /// Not attempted because DNS setup did not fully succeed
    Skipped,
}

impl BindOutcome {
    /// Bound or already bound
    pub fn is_success(&self) -> bool {
        matches!(self, BindOutcome::Bound | BindOutcome::AlreadyBound)
    }

    /// Status tag used in console output
    pub fn tag(&self) -> &'static str {
        match self {
            BindOutcome::Bound => "bound",
            BindOutcome::AlreadyBound => "exists",
            BindOutcome::Failed { .. } => "failed",
            BindOutcome::Skipped => "skipped",
        }
    }
}

/// States of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing done yet
    Idle,
    /// The zone was found
    ZoneResolved,
    /// Record creation calls have all returned
    RecordsSubmitted,
    /// Email routing was attempted
    RoutingConfigured,
    /// Custom domains were attempted
    DomainsBound,
    /// Terminal: the run went through every stage
    Done,
    /// Terminal: the zone could not be resolved
    Aborted,
}

impl RunState {
    /// Whether the run can no longer advance
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::ZoneResolved)
                | (RunState::Idle, RunState::Aborted)
                | (RunState::ZoneResolved, RunState::RecordsSubmitted)
                | (RunState::RecordsSubmitted, RunState::RoutingConfigured)
                | (RunState::RoutingConfigured, RunState::DomainsBound)
                | (RunState::DomainsBound, RunState::Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::ZoneResolved => "zone_resolved",
            RunState::RecordsSubmitted => "records_submitted",
            RunState::RoutingConfigured => "routing_configured",
            RunState::DomainsBound => "domains_bound",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Read-only comparison of a plan against the records a zone holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Planned records found in the zone
    pub present: Vec<DnsRecord>,
    /// Planned records absent from the zone
    pub missing: Vec<DnsRecord>,
    /// Zone records sharing a planned name and type but not matching any planned identity
    pub conflicting: Vec<DnsRecord>,
}

impl AuditReport {
    /// Every planned record is present
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }

    /// Identities of the missing records
    pub fn missing_identities(&self) -> Vec<RecordIdentity> {
        self.missing.iter().map(DnsRecord::identity).collect()
    }
}

/// Everything a full run did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Domain reconciled
    pub domain: String,
    /// Terminal state
    pub state: RunState,
    /// Zone resolved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    /// Concurrent batch outcomes
    pub records: ReconciliationResult,
    /// Sequential mail record outcomes, in plan order
    pub mail_records: Vec<(DnsRecord, UpsertOutcome)>,
    /// Routing outcome, when routing was planned
    pub routing: Option<RoutingOutcome>,
    /// Domain → binding outcome
    pub bindings: BTreeMap<String, BindOutcome>,
    /// When the run finished
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RunReport {
    pub(crate) fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            state: RunState::Idle,
            zone_id: None,
            records: ReconciliationResult::new(),
            mail_records: Vec::new(),
            routing: None,
            bindings: BTreeMap::new(),
            finished_at: chrono::Utc::now(),
        }
    }

    pub(crate) fn set_zone(&mut self, zone: &Zone) {
        self.zone_id = Some(zone.id.clone());
    }

    /// Whether every requested operation succeeded
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
            && self.records.all_succeeded()
            && self.mail_records.iter().all(|(_, o)| o.is_success())
            && self
                .routing
                .as_ref()
                .is_none_or(|r| r.status() == RoutingStatus::Success)
            && self.bindings.values().all(BindOutcome::is_success)
    }

    /// Number of failed operations across all stages
    pub fn failure_count(&self) -> usize {
        let records = self.records.total() - self.records.succeeded();
        let mail = self.mail_records.iter().filter(|(_, o)| !o.is_success()).count();
        let routing = self.routing.as_ref().map_or(0, |r| r.failures().len());
        let bindings = self.bindings.values().filter(|b| !b.is_success()).count();
        records + mail + routing + bindings
    }
}
