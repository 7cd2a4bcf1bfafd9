//! In-memory job registry with a (status, due time) index.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{
    DueCursor, DuePage, Job, JobRegistry, JobStatus, NewJob, ReclaimSummary, RegistryError,
    ResultMetadata,
};
use crate::util::{Clock, JobId, SystemClock};

/// Key ordering due jobs: pending (rank 0) before scheduled (rank 1), then
/// ascending due time, then id.
type DueKey = (u8, u128, JobId);

const PENDING_RANK: u8 = 0;
const SCHEDULED_RANK: u8 = 1;

fn due_key(job: &Job) -> Option<DueKey> {
    match job.status {
        JobStatus::Pending => Some((PENDING_RANK, 0, job.job_id.clone())),
        JobStatus::Scheduled => Some((SCHEDULED_RANK, job.due_at_ms.unwrap_or(0), job.job_id.clone())),
        JobStatus::InProgress | JobStatus::Completed | JobStatus::Failed => None,
    }
}

fn claim_key(job: &Job) -> Option<(u128, JobId)> {
    (job.status == JobStatus::InProgress).then(|| (job.claimed_at_ms.unwrap_or(0), job.job_id.clone()))
}

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<JobId, Job>,
    /// Range-scannable index of `Pending` and `Scheduled` jobs.
    due_index: BTreeSet<DueKey>,
    /// `InProgress` jobs ordered by claim time, for the staleness sweep.
    claim_index: BTreeSet<(u128, JobId)>,
}

impl RegistryState {
    fn unindex(&mut self, job: &Job) {
        if let Some(key) = due_key(job) {
            self.due_index.remove(&key);
        }
        if let Some(key) = claim_key(job) {
            self.claim_index.remove(&key);
        }
    }

    fn index(&mut self, job: &Job) {
        if let Some(key) = due_key(job) {
            self.due_index.insert(key);
        }
        if let Some(key) = claim_key(job) {
            self.claim_index.insert(key);
        }
    }

    fn put(&mut self, job: Job) {
        if let Some(previous) = self.jobs.remove(&job.job_id) {
            self.unindex(&previous);
        }
        self.index(&job);
        self.jobs.insert(job.job_id.clone(), job);
    }

    /// Apply `change` to a copy of the job and store it only if it succeeds.
    fn update<F>(&mut self, job_id: &JobId, change: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job) -> Result<(), RegistryError>,
    {
        let mut job = self
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))?;
        change(&mut job)?;
        self.put(job.clone());
        Ok(job)
    }
}

fn require_in_progress(job: &Job, action: &'static str) -> Result<(), RegistryError> {
    if job.status == JobStatus::InProgress {
        Ok(())
    } else {
        Err(RegistryError::InvalidTransition {
            job_id: job.job_id.clone(),
            from: job.status,
            action,
        })
    }
}

/// Record a failed attempt, moving to `Scheduled` at `due_at_ms` or to
/// `Failed` once the attempt budget is spent.
fn fail_attempt(job: &mut Job, due_at_ms: u128, now_ms: u128, exhausted_reason: &str) {
    job.attempt_count = job.attempt_count.saturating_add(1);
    job.claimed_at_ms = None;
    job.updated_at_ms = now_ms;
    if job.attempt_count >= job.max_attempts {
        job.status = JobStatus::Failed;
        job.due_at_ms = None;
        job.failure_reason = Some(exhausted_reason.to_string());
    } else {
        job.status = JobStatus::Scheduled;
        job.due_at_ms = Some(due_at_ms);
    }
}

/// Job registry kept in process memory, for development, tests and
/// single-node deployments.
pub struct InMemoryJobRegistry {
    state: Mutex<RegistryState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobRegistry {
    /// Create an empty registry using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry stamping writes with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            clock,
        }
    }

    /// Insert or replace a record exactly as given (fixtures, imports).
    pub fn upsert(&self, job: Job) {
        self.state.lock().put(job);
    }

    /// Snapshot of every stored job.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.state.lock().jobs.values().cloned().collect()
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn create(&self, job: NewJob) -> Result<Job, RegistryError> {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        if state.jobs.contains_key(&job.job_id) {
            return Err(RegistryError::DuplicateJob(job.job_id));
        }
        let job = job.into_job(now_ms);
        state.put(job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: &JobId) -> Result<Job, RegistryError> {
        self.state
            .lock()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))
    }

    async fn claim(&self, job_id: &JobId, expected: JobStatus) -> Result<Job, RegistryError> {
        let now_ms = self.clock.now_ms();
        self.state.lock().update(job_id, |job| {
            if !expected.is_claimable() {
                return Err(RegistryError::InvalidTransition {
                    job_id: job.job_id.clone(),
                    from: expected,
                    action: "claim",
                });
            }
            if job.status != expected {
                return Err(RegistryError::ClaimLost(job.job_id.clone()));
            }
            job.status = JobStatus::InProgress;
            job.due_at_ms = None;
            job.claimed_at_ms = Some(now_ms);
            job.updated_at_ms = now_ms;
            Ok(())
        })
    }

    async fn complete(&self, job_id: &JobId, result: ResultMetadata) -> Result<Job, RegistryError> {
        let now_ms = self.clock.now_ms();
        self.state.lock().update(job_id, |job| {
            require_in_progress(job, "complete")?;
            job.status = JobStatus::Completed;
            job.result = Some(result);
            job.due_at_ms = None;
            job.claimed_at_ms = None;
            job.updated_at_ms = now_ms;
            Ok(())
        })
    }

    async fn schedule_retry(&self, job_id: &JobId, next_due_at_ms: u128) -> Result<Job, RegistryError> {
        let now_ms = self.clock.now_ms();
        self.state.lock().update(job_id, |job| {
            require_in_progress(job, "schedule retry")?;
            fail_attempt(job, next_due_at_ms, now_ms, "attempts exhausted");
            Ok(())
        })
    }

    async fn mark_failed(&self, job_id: &JobId, reason: &str) -> Result<Job, RegistryError> {
        let now_ms = self.clock.now_ms();
        self.state.lock().update(job_id, |job| {
            require_in_progress(job, "mark failed")?;
            job.status = JobStatus::Failed;
            job.attempt_count = job.attempt_count.saturating_add(1);
            job.failure_reason = Some(reason.to_string());
            job.due_at_ms = None;
            job.claimed_at_ms = None;
            job.updated_at_ms = now_ms;
            Ok(())
        })
    }

    async fn query_due(
        &self,
        now_ms: u128,
        cursor: Option<DueCursor>,
        limit: usize,
    ) -> Result<DuePage, RegistryError> {
        let limit = limit.max(1);
        let state = self.state.lock();
        let lower = cursor.map_or(Bound::Unbounded, |c| {
            let rank = if c.pending { PENDING_RANK } else { SCHEDULED_RANK };
            Bound::Excluded((rank, c.sort_key, c.job_id))
        });

        let mut keys = state
            .due_index
            .range((lower, Bound::Unbounded))
            .take_while(|(rank, due, _)| *rank == PENDING_RANK || *due <= now_ms);

        let mut jobs = Vec::with_capacity(limit.min(1024));
        let mut last: Option<&DueKey> = None;
        for key in keys.by_ref().take(limit) {
            if let Some(job) = state.jobs.get(&key.2) {
                jobs.push(job.clone());
            }
            last = Some(key);
        }

        let next = match (keys.next(), last) {
            (Some(_), Some((rank, sort_key, job_id))) => Some(DueCursor {
                sort_key: *sort_key,
                pending: *rank == PENDING_RANK,
                job_id: job_id.clone(),
            }),
            _ => None,
        };
        Ok(DuePage { jobs, next })
    }

    async fn reclaim_stale(&self, now_ms: u128, ttl: Duration) -> Result<ReclaimSummary, RegistryError> {
        let ttl_ms = ttl.as_millis();
        let mut state = self.state.lock();
        let stale: Vec<JobId> = state
            .claim_index
            .iter()
            .take_while(|(claimed_at, _)| claimed_at.saturating_add(ttl_ms) <= now_ms)
            .map(|(_, job_id)| job_id.clone())
            .collect();

        let mut summary = ReclaimSummary::default();
        for job_id in stale {
            let job = state.update(&job_id, |job| {
                fail_attempt(job, now_ms, now_ms, "claim expired; attempts exhausted");
                Ok(())
            })?;
            if job.status == JobStatus::Failed {
                summary.failed.push(job_id);
            } else {
                summary.rescheduled.push(job_id);
            }
        }
        Ok(summary)
    }
}
