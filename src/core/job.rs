//! Job records and the lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::{CorrelationId, JobId, PrincipalId};

/// Status of a job in its lifecycle.
///
/// ```text
/// Pending ----claim----> InProgress --success--> Completed
/// Scheduled(due) -claim-> InProgress --retryable failure, attempts left--> Scheduled
/// InProgress --permanent failure or attempts exhausted--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and waiting for its first attempt.
    Pending,
    /// Claimed by exactly one executor.
    InProgress,
    /// Waiting for a retry at `due_at_ms`.
    Scheduled,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished unsuccessfully. Terminal.
    Failed,
}

impl JobStatus {
    /// Whether no further status writes are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `claim` may start from this status.
    #[must_use]
    pub const fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which due predicate a job matched when the scheduler discovered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    /// Never attempted.
    Pending,
    /// Retry whose due time has passed.
    Scheduled,
}

impl DiscoverySource {
    /// Status a claim must expect for a job found through this source.
    #[must_use]
    pub const fn expected_status(self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Scheduled => JobStatus::Scheduled,
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
        })
    }
}

/// Outcome data recorded on a completed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Number of bytes persisted.
    pub size_bytes: u64,
    /// Key of the stored object.
    pub storage_key: String,
    /// MIME type of the stored media.
    pub content_type: String,
    /// File extension of the selected format.
    pub extension: String,
    /// Identifier of the media at its source.
    pub source_id: Option<String>,
    /// Title reported by the source.
    pub title: Option<String>,
    /// Description reported by the source.
    pub description: Option<String>,
    /// Thumbnail location reported by the source.
    pub thumbnail_url: Option<String>,
    /// Uploader identifier reported by the source.
    pub uploader_id: Option<String>,
    /// Uploader display name reported by the source.
    pub uploader_name: Option<String>,
    /// Publication time reported by the source (seconds since epoch).
    pub published_at: Option<i64>,
}

/// Request to create a job; the registry fills in lifecycle fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Stable external identifier.
    pub job_id: JobId,
    /// Owner of the job, used to resolve notification channels.
    pub principal_id: PrincipalId,
    /// Opaque locator of the remote resource.
    pub source_ref: String,
    /// Upper bound on attempts, including the first.
    pub max_attempts: u32,
    /// Optional correlation id for tracing.
    pub correlation_id: Option<CorrelationId>,
}

impl NewJob {
    /// Create a job request with the given attempt bound.
    pub fn new(
        job_id: impl Into<JobId>,
        principal_id: impl Into<PrincipalId>,
        source_ref: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            principal_id: principal_id.into(),
            source_ref: source_ref.into(),
            max_attempts,
            correlation_id: None,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Materialize the record stored by a registry at creation time.
    #[must_use]
    pub fn into_job(self, now_ms: u128) -> Job {
        Job {
            job_id: self.job_id,
            principal_id: self.principal_id,
            status: JobStatus::Pending,
            due_at_ms: None,
            attempt_count: 0,
            max_attempts: self.max_attempts,
            source_ref: self.source_ref,
            correlation_id: self.correlation_id,
            result: None,
            failure_reason: None,
            claimed_at_ms: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

/// One download unit of work, as stored in the job registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Stable external identifier.
    pub job_id: JobId,
    /// Owner of the job.
    pub principal_id: PrincipalId,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Earliest re-dispatch time; only meaningful while `Scheduled`.
    pub due_at_ms: Option<u128>,
    /// Failed attempts so far. Never decreases.
    pub attempt_count: u32,
    /// Upper bound on attempts. Immutable.
    pub max_attempts: u32,
    /// Opaque locator of the remote resource.
    pub source_ref: String,
    /// Optional correlation id for tracing.
    pub correlation_id: Option<CorrelationId>,
    /// Populated only once `Completed`.
    pub result: Option<ResultMetadata>,
    /// Reason recorded when the job `Failed`.
    pub failure_reason: Option<String>,
    /// When the current claim was taken; only meaningful while `InProgress`.
    pub claimed_at_ms: Option<u128>,
    /// Creation time.
    pub created_at_ms: u128,
    /// Time of the last write.
    pub updated_at_ms: u128,
}

impl Job {
    /// Whether the scheduler may dispatch this job at `now_ms`.
    #[must_use]
    pub fn is_due(&self, now_ms: u128) -> bool {
        match self.status {
            JobStatus::Pending => true,
            JobStatus::Scheduled => self.due_at_ms.is_some_and(|due| due <= now_ms),
            JobStatus::InProgress | JobStatus::Completed | JobStatus::Failed => false,
        }
    }

    /// Which due predicate this job satisfies, if any.
    #[must_use]
    pub fn discovery_source(&self, now_ms: u128) -> Option<DiscoverySource> {
        if !self.is_due(now_ms) {
            return None;
        }
        match self.status {
            JobStatus::Pending => Some(DiscoverySource::Pending),
            _ => Some(DiscoverySource::Scheduled),
        }
    }

    /// Whether one more failed attempt would exhaust the retry budget.
    #[must_use]
    pub const fn is_last_attempt(&self) -> bool {
        self.attempt_count.saturating_add(1) >= self.max_attempts
    }
}
