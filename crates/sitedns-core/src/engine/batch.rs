//! Record upsert and the concurrent batch creator
//!
//! The upsert is the idempotency boundary: a create call is issued
//! unconditionally and an "already exists" answer counts as success. Because
//! every upsert is independent and idempotent at the provider, concurrent
//! upserts for different records need no cross-record lock.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::report::{ReconciliationResult, UpsertOutcome};
use crate::traits::{DnsRecord, ErrorClassifier, SiteProvider, Zone};

/// Turn a provider call result into an [`UpsertOutcome`]
///
/// `AlreadyExists` classifications become success; transport failures keep
/// their kind but aggregate like any other failure.
pub fn classify_result<C: ErrorClassifier + ?Sized>(
    classifier: &C,
    result: std::result::Result<(), Error>,
) -> UpsertOutcome {
    match result {
        Ok(()) => UpsertOutcome::Created,
        Err(err) => match classifier.classify_error(&err) {
            ErrorKind::AlreadyExists => UpsertOutcome::AlreadyExists,
            kind => UpsertOutcome::Failed {
                kind,
                reason: err.to_string(),
                messages: err.api_messages().to_vec(),
            },
        },
    }
}

/// Create one record, treating "already exists" as success
pub async fn upsert_record(
    provider: &dyn SiteProvider,
    zone: &Zone,
    record: &DnsRecord,
) -> UpsertOutcome {
    if let Err(err) = record.validate() {
        return UpsertOutcome::Failed {
            kind: ErrorKind::Provider,
            reason: err.to_string(),
            messages: Vec::new(),
        };
    }

    if !provider.supports_record(record) {
        return UpsertOutcome::Failed {
            kind: ErrorKind::Provider,
            reason: format!(
                "provider {} does not support record {}",
                provider.provider_name(),
                record
            ),
            messages: Vec::new(),
        };
    }

    let outcome = classify_result(provider, provider.create_record(&zone.id, record).await);

    match &outcome {
        UpsertOutcome::Created => info!("[created] {}", record),
        UpsertOutcome::AlreadyExists => info!("[exists] {}", record),
        UpsertOutcome::Failed { kind, reason, .. } => {
            error!("[failed] {} ({}): {}", record, kind, reason)
        }
        UpsertOutcome::Cancelled => {}
    }

    outcome
}

/// Fan record upserts out over at most `concurrency` in-flight tasks
///
/// Every task is awaited. A fatal classification (authentication) aborts the
/// remaining tasks; their records are reported as [`UpsertOutcome::Cancelled`].
/// Ordinary failures never cancel siblings. Each record is attempted at most
/// once.
pub(crate) async fn create_all(
    provider: Arc<dyn SiteProvider>,
    zone: &Zone,
    records: &[DnsRecord],
    concurrency: usize,
) -> Result<ReconciliationResult> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.name.as_str()) {
            return Err(Error::invalid_input(format!(
                "duplicate record name in batch: {}",
                record.name
            )));
        }
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for record in records.iter().cloned() {
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let zone = zone.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (record.name, UpsertOutcome::Cancelled);
            };
            let outcome = upsert_record(provider.as_ref(), &zone, &record).await;
            (record.name, outcome)
        });
    }

    let mut result = ReconciliationResult::new();
    let mut cancelled = false;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, outcome)) => {
                if !cancelled && outcome.error_kind().is_some_and(|k| k.is_fatal()) {
                    warn!(
                        "Fatal error for {}, cancelling {} in-flight record(s)",
                        name,
                        tasks.len()
                    );
                    cancelled = true;
                    semaphore.close();
                    tasks.abort_all();
                }
                result.insert(name, outcome);
            }
            Err(e) if e.is_cancelled() => {
                debug!("Record task aborted");
            }
            Err(e) => {
                error!("Record task panicked: {}", e);
            }
        }
    }

    // Aborted or panicked tasks leave no entry of their own
    for record in records {
        if !result.contains(&record.name) {
            let outcome = if cancelled {
                UpsertOutcome::Cancelled
            } else {
                UpsertOutcome::Failed {
                    kind: ErrorKind::Provider,
                    reason: "record task did not complete".to_string(),
                    messages: Vec::new(),
                }
            };
            result.insert(record.name.clone(), outcome);
        }
    }

    Ok(result)
}
