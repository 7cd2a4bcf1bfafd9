//! Periodic discovery and batched dispatch of due jobs.
//!
//! A run reconciles stale claims, then walks the due set page by page,
//! dropping duplicate ids and claiming and dispatching jobs in fixed-size
//! batches with a pacing delay between batches. Only one page plus one batch
//! of jobs is held at a time. Every dispatch goes through
//! [`JobRegistry::claim`], so overlapping runs that see the same job race on
//! the claim and the loser skips it.

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;

use crate::core::{
    build_audit_event, AuditAction, AuditSink, DiscoverySource, DueCursor, Job, JobDispatcher,
    JobRegistry, RegistryError,
};
use crate::util::{Clock, JobId};

/// Runtime limits for a scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerLimits {
    /// Jobs dispatched concurrently per batch.
    pub batch_size: usize,
    /// Delay between consecutive batches.
    pub pacing_delay: Duration,
    /// Page size used when scanning the registry.
    pub page_size: usize,
    /// Age after which an `InProgress` claim is considered abandoned.
    pub claim_ttl: Duration,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pacing_delay: Duration::from_secs(1),
            page_size: 100,
            claim_ttl: Duration::from_secs(900),
        }
    }
}

/// Counters for one discovery source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounters {
    /// Distinct due jobs discovered.
    pub due: usize,
    /// Jobs claimed and handed to the dispatcher.
    pub dispatched: usize,
    /// Jobs another actor claimed first.
    pub skipped: usize,
    /// Jobs whose claim or dispatch failed.
    pub errors: usize,
}

/// A job that could not be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    /// Job that failed.
    pub job_id: JobId,
    /// Predicate the job was discovered through.
    pub source: DiscoverySource,
    /// Error description.
    pub message: String,
    /// Whether the error was a state-machine violation.
    pub integrity_violation: bool,
}

/// Result of one scheduler run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerReport {
    /// Counters for jobs discovered as pending.
    pub pending: SourceCounters,
    /// Counters for jobs discovered as scheduled retries.
    pub scheduled: SourceCounters,
    /// Number of batches dispatched.
    pub batches: usize,
    /// Stale claims taken back by the reconciliation sweep.
    pub reclaimed: usize,
    /// Repeated ids dropped from the due set.
    pub duplicates_dropped: usize,
    /// Whether a due page query failed. The run stops there; batches
    /// dispatched from earlier pages stand.
    pub query_failed: bool,
    /// Per-job dispatch failures.
    pub failures: Vec<DispatchFailure>,
}

impl SchedulerReport {
    /// Distinct due jobs across sources.
    #[must_use]
    pub const fn due_count(&self) -> usize {
        self.pending.due + self.scheduled.due
    }

    /// Jobs dispatched across sources.
    #[must_use]
    pub const fn dispatched_count(&self) -> usize {
        self.pending.dispatched + self.scheduled.dispatched
    }

    /// Dispatch errors across sources.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.pending.errors + self.scheduled.errors
    }

    /// Claims lost to concurrent runs across sources.
    #[must_use]
    pub const fn skipped_count(&self) -> usize {
        self.pending.skipped + self.scheduled.skipped
    }

    /// Counters for one source.
    #[must_use]
    pub const fn counters(&self, source: DiscoverySource) -> &SourceCounters {
        match source {
            DiscoverySource::Pending => &self.pending,
            DiscoverySource::Scheduled => &self.scheduled,
        }
    }

    fn counters_mut(&mut self, source: DiscoverySource) -> &mut SourceCounters {
        match source {
            DiscoverySource::Pending => &mut self.pending,
            DiscoverySource::Scheduled => &mut self.scheduled,
        }
    }
}

enum DispatchOutcome {
    Dispatched,
    ClaimLost,
    Failed { message: String, integrity_violation: bool },
}

/// Discovers due jobs and dispatches them in paced batches.
pub struct Scheduler {
    registry: Arc<dyn JobRegistry>,
    dispatcher: Arc<dyn JobDispatcher>,
    clock: Arc<dyn Clock>,
    limits: SchedulerLimits,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl Scheduler {
    /// Create a scheduler from components.
    #[must_use]
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        dispatcher: Arc<dyn JobDispatcher>,
        clock: Arc<dyn Clock>,
        limits: SchedulerLimits,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            clock,
            limits,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<Mutex<Box<dyn AuditSink>>>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Limits in use.
    #[must_use]
    pub const fn limits(&self) -> &SchedulerLimits {
        &self.limits
    }

    /// Execute one scheduler run. Never fails; problems are logged and
    /// reflected in the report.
    pub async fn run_once(&self) -> SchedulerReport {
        let now_ms = self.clock.now_ms();
        let mut report = SchedulerReport::default();

        match self.registry.reclaim_stale(now_ms, self.limits.claim_ttl).await {
            Ok(summary) => {
                report.reclaimed = summary.total();
                if report.reclaimed > 0 {
                    tracing::warn!(
                        rescheduled = summary.rescheduled.len(),
                        failed = summary.failed.len(),
                        "reclaimed stale claims"
                    );
                }
                for job_id in summary.rescheduled.iter().chain(summary.failed.iter()) {
                    self.record_audit(job_id, "", AuditAction::Reclaim);
                }
            }
            Err(e) => tracing::warn!(error = %e, "stale claim sweep failed"),
        }

        let batch_size = self.limits.batch_size.max(1);
        let page_size = self.limits.page_size.max(1);
        let mut seen = HashSet::new();
        let mut ready: VecDeque<(Job, DiscoverySource)> = VecDeque::with_capacity(page_size + batch_size);
        let mut cursor: Option<DueCursor> = None;
        let mut exhausted = false;

        'run: loop {
            while !exhausted && ready.len() < batch_size {
                match self.registry.query_due(now_ms, cursor.take(), page_size).await {
                    Ok(page) => {
                        admit(page.jobs, now_ms, &mut seen, &mut ready, &mut report);
                        cursor = page.next;
                        exhausted = cursor.is_none();
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            dispatched = report.dispatched_count(),
                            "failed to query due jobs; ending run"
                        );
                        report.query_failed = true;
                        break 'run;
                    }
                }
            }
            if ready.is_empty() {
                break;
            }

            let take = batch_size.min(ready.len());
            let batch: Vec<(Job, DiscoverySource)> = ready.drain(..take).collect();
            if report.batches > 0 && !self.limits.pacing_delay.is_zero() {
                tokio::time::sleep(self.limits.pacing_delay).await;
            }
            tracing::debug!(batch = report.batches, size = batch.len(), "dispatching batch");
            report.batches += 1;

            let outcomes = join_all(batch.iter().map(|(job, source)| async move {
                let outcome = AssertUnwindSafe(self.dispatch_one(job, *source))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| DispatchOutcome::Failed {
                        message: "dispatch panicked".into(),
                        integrity_violation: false,
                    });
                (job.job_id.clone(), *source, outcome)
            }))
            .await;

            for (job_id, source, outcome) in outcomes {
                let counters = report.counters_mut(source);
                match outcome {
                    DispatchOutcome::Dispatched => counters.dispatched += 1,
                    DispatchOutcome::ClaimLost => counters.skipped += 1,
                    DispatchOutcome::Failed {
                        message,
                        integrity_violation,
                    } => {
                        counters.errors += 1;
                        report.failures.push(DispatchFailure {
                            job_id,
                            source,
                            message,
                            integrity_violation,
                        });
                    }
                }
            }
        }

        tracing::info!(
            due = report.due_count(),
            dispatched = report.dispatched_count(),
            errors = report.error_count(),
            skipped = report.skipped_count(),
            pending_due = report.pending.due,
            pending_dispatched = report.pending.dispatched,
            pending_errors = report.pending.errors,
            scheduled_due = report.scheduled.due,
            scheduled_dispatched = report.scheduled.dispatched,
            scheduled_errors = report.scheduled.errors,
            batches = report.batches,
            "scheduler run finished"
        );
        report
    }

    async fn dispatch_one(&self, job: &Job, source: DiscoverySource) -> DispatchOutcome {
        let claimed = match self.registry.claim(&job.job_id, source.expected_status()).await {
            Ok(claimed) => claimed,
            Err(RegistryError::ClaimLost(_)) => {
                tracing::debug!(job_id = %job.job_id, "claim lost; skipping");
                return DispatchOutcome::ClaimLost;
            }
            Err(e) => {
                let integrity_violation = e.is_integrity_violation();
                tracing::error!(job_id = %job.job_id, error = %e, "claim failed");
                return DispatchOutcome::Failed {
                    message: e.to_string(),
                    integrity_violation,
                };
            }
        };
        self.record_audit(&claimed.job_id, claimed.principal_id.as_str(), AuditAction::Claim);

        match self.dispatcher.dispatch(claimed).await {
            Ok(()) => DispatchOutcome::Dispatched,
            Err(e) => {
                let integrity_violation = e.is_integrity_violation();
                if integrity_violation {
                    tracing::error!(job_id = %job.job_id, error = %e, "state machine violation during dispatch");
                } else {
                    tracing::warn!(job_id = %job.job_id, error = %e, "dispatch failed");
                }
                DispatchOutcome::Failed {
                    message: e.to_string(),
                    integrity_violation,
                }
            }
        }
    }

    fn record_audit(&self, job_id: &JobId, principal_id: &str, action: AuditAction) {
        if let Some(audit) = &self.audit {
            audit.lock().record(build_audit_event(
                job_id.as_str(),
                principal_id,
                action,
                None,
                self.clock.now_ms(),
            ));
        }
    }
}

/// Queue the due, not yet seen jobs of one page for dispatch.
fn admit(
    jobs: Vec<Job>,
    now_ms: u128,
    seen: &mut HashSet<JobId>,
    ready: &mut VecDeque<(Job, DiscoverySource)>,
    report: &mut SchedulerReport,
) {
    for job in jobs {
        let Some(source) = job.discovery_source(now_ms) else {
            tracing::warn!(job_id = %job.job_id, status = %job.status, "registry returned a job that is not due");
            continue;
        };
        if !seen.insert(job.job_id.clone()) {
            report.duplicates_dropped += 1;
            tracing::warn!(job_id = %job.job_id, "duplicate job in due set dropped");
            continue;
        }
        report.counters_mut(source).due += 1;
        ready.push_back((job, source));
    }
}
