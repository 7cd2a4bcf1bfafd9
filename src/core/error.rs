//! Error types for orchestrator operations.
//!
//! Collaborator errors are classified at component boundaries: the worker turns
//! them into retry-or-fail decisions, the fan-out into failed items and the
//! pruner into deletions or recorded errors. Only registry integrity errors and
//! unexpected backend failures travel further up.

use std::time::Duration;

use thiserror::Error;

use crate::core::JobStatus;
use crate::util::{ChannelId, JobId};

/// Errors produced by a job registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A job with the same id already exists.
    #[error("duplicate job: {0}")]
    DuplicateJob(JobId),
    /// No job with this id exists.
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// Another actor claimed the job first, or it is no longer in the expected state.
    #[error("claim lost: {0}")]
    ClaimLost(JobId),
    /// The requested transition is not allowed from the job's current status.
    #[error("invalid transition for job {job_id}: cannot {action} from {from}")]
    InvalidTransition {
        /// Job the transition was attempted on.
        job_id: JobId,
        /// Status the job was in.
        from: JobStatus,
        /// Attempted operation.
        action: &'static str,
    },
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl RegistryError {
    /// Whether this error signals a state-machine violation.
    #[must_use]
    pub const fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

/// Errors produced by a recipient directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No channel with this id exists.
    #[error("channel not found: {0}")]
    NotFound(ChannelId),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors reported by the source collaborator.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source could not be reached right now.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The source reference is unusable and will never succeed.
    #[error("source invalid: {0}")]
    Invalid(String),
}

/// Failure to persist bytes in durable storage. Always retryable.
#[derive(Debug, Clone, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Errors reported by the notification transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The channel is permanently invalid (unregistered, revoked, expired).
    #[error("channel disabled")]
    Disabled,
    /// Temporary delivery failure.
    #[error("transport error: {0}")]
    Transient(String),
    /// The attempt did not finish within its time budget.
    #[error("transport timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a single fetch-and-persist attempt failed.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    /// The source collaborator failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The attempt exceeded its time budget.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl AttemptError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Source(SourceError::Invalid(_)) => false,
            Self::Source(SourceError::Unavailable(_)) | Self::Storage(_) | Self::Timeout(_) => true,
        }
    }
}

/// Errors surfaced by [`crate::core::Worker::process`].
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The registry rejected a read or write.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors surfaced while handing a claimed job to its executor.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker failed to record an outcome.
    #[error(transparent)]
    Worker(#[from] WorkerError),
    /// The dispatch collaborator refused the job.
    #[error("dispatch rejected: {0}")]
    Rejected(String),
}

impl DispatchError {
    /// Whether this error signals a state-machine violation.
    #[must_use]
    pub const fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Worker(WorkerError::Registry(e)) if e.is_integrity_violation())
    }
}

/// Errors that fail a whole fan-out call (as opposed to a single channel).
#[derive(Debug, Error)]
pub enum FanoutError {
    /// The job could not be loaded.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The principal's channels could not be resolved.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// Fan-out was triggered for a job that has not completed.
    #[error("job {job_id} is {status}, not completed")]
    NotCompleted {
        /// Job the fan-out was requested for.
        job_id: JobId,
        /// Its current status.
        status: JobStatus,
    },
}

/// Errors raised by the notification dispatch collaborator.
#[derive(Debug, Error)]
#[error("notification enqueue failed: {0}")]
pub struct NotifyError(pub String);

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_classification() {
        assert!(AttemptError::from(SourceError::Unavailable("dns".into())).is_retryable());
        assert!(!AttemptError::from(SourceError::Invalid("no uri".into())).is_retryable());
        assert!(AttemptError::from(StorageError("disk".into())).is_retryable());
        assert!(AttemptError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn integrity_violation_detected_through_dispatch() {
        let err = DispatchError::from(WorkerError::from(RegistryError::InvalidTransition {
            job_id: JobId::from("j1"),
            from: JobStatus::Completed,
            action: "complete",
        }));
        assert!(err.is_integrity_violation());
        assert!(!DispatchError::Rejected("full".into()).is_integrity_violation());
    }
}
