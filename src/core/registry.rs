//! Job registry contract.
//!
//! The registry is the single source of truth for job state. Every mutation is
//! a conditional write: `claim` only moves a job out of the status the caller
//! observed, which is what keeps overlapping scheduler runs from dispatching
//! the same job twice.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Job, JobStatus, NewJob, RegistryError, ResultMetadata};
use crate::util::JobId;

/// Position in a due-job scan; the next page starts strictly after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueCursor {
    /// Sort key of the last returned job (0 for pending jobs, else `due_at_ms`).
    pub sort_key: u128,
    /// Whether the last returned job was pending.
    pub pending: bool,
    /// Id of the last returned job.
    pub job_id: JobId,
}

/// One page of a due-job scan.
#[derive(Debug, Clone, Default)]
pub struct DuePage {
    /// Due jobs: pending first, then scheduled ascending by due time.
    pub jobs: Vec<Job>,
    /// Cursor for the next page, `None` when exhausted.
    pub next: Option<DueCursor>,
}

/// Result of a staleness reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimSummary {
    /// Stale claims moved back to `Scheduled`.
    pub rescheduled: Vec<JobId>,
    /// Stale claims that exhausted their attempts and moved to `Failed`.
    pub failed: Vec<JobId>,
}

impl ReclaimSummary {
    /// Total jobs touched by the sweep.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rescheduled.len() + self.failed.len()
    }
}

/// Durable store of job records.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Insert a new `Pending` job. Fails with `DuplicateJob` if the id exists.
    async fn create(&self, job: NewJob) -> Result<Job, RegistryError>;

    /// Read a job.
    async fn get(&self, job_id: &JobId) -> Result<Job, RegistryError>;

    /// Move a job from `expected` to `InProgress` if it is still in `expected`.
    ///
    /// Returns `ClaimLost` when another actor got there first.
    async fn claim(&self, job_id: &JobId, expected: JobStatus) -> Result<Job, RegistryError>;

    /// Record success. Only valid from `InProgress`.
    async fn complete(&self, job_id: &JobId, result: ResultMetadata) -> Result<Job, RegistryError>;

    /// Record a retryable failure.
    ///
    /// Moves to `Scheduled` at `next_due_at_ms` and increments the attempt
    /// count, or to `Failed` when `attempt_count + 1 >= max_attempts`. Only
    /// valid from `InProgress`.
    async fn schedule_retry(&self, job_id: &JobId, next_due_at_ms: u128) -> Result<Job, RegistryError>;

    /// Record a permanent failure. Only valid from `InProgress`.
    async fn mark_failed(&self, job_id: &JobId, reason: &str) -> Result<Job, RegistryError>;

    /// Scan due jobs at `now_ms`, starting after `cursor`, at most `limit` per page.
    async fn query_due(
        &self,
        now_ms: u128,
        cursor: Option<DueCursor>,
        limit: usize,
    ) -> Result<DuePage, RegistryError>;

    /// Treat claims older than `ttl` as timed-out attempts.
    ///
    /// Each stale `InProgress` job is rescheduled at `now_ms` with its attempt
    /// count incremented, or failed if that exhausts its attempts.
    async fn reclaim_stale(&self, now_ms: u128, ttl: Duration) -> Result<ReclaimSummary, RegistryError>;
}
