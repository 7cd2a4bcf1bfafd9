//! Fetch-and-persist worker.
//!
//! One invocation runs one attempt for a job that has already been claimed,
//! then records exactly one registry write: `complete`, `schedule_retry` or
//! `mark_failed`. A notification trigger is enqueued only after `complete`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{
    build_audit_event, AttemptError, AuditAction, AuditSink, DispatchError, Job, JobDispatcher,
    JobRegistry, JobStatus, MediaFormat, MediaStore, NotificationDispatch, NotificationTrigger,
    RegistryError, ResultMetadata, RetryPolicy, SourceError, SourceFetcher, WorkerError,
};
use crate::util::{Clock, JobId};

/// What a worker invocation recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The job completed.
    Completed {
        /// Whether the fan-out trigger was accepted by the dispatch queue.
        notification_enqueued: bool,
    },
    /// Another attempt was scheduled.
    RetryScheduled {
        /// Attempt count after this failure.
        attempt_count: u32,
        /// When the job becomes due again.
        due_at_ms: u128,
    },
    /// The job failed permanently.
    Failed {
        /// Recorded failure reason.
        reason: String,
    },
}

/// Executes download attempts for claimed jobs.
pub struct Worker {
    registry: Arc<dyn JobRegistry>,
    source: Arc<dyn SourceFetcher>,
    store: Arc<dyn MediaStore>,
    notifier: Arc<dyn NotificationDispatch>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl Worker {
    /// Create a worker from its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        source: Arc<dyn SourceFetcher>,
        store: Arc<dyn MediaStore>,
        notifier: Arc<dyn NotificationDispatch>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            source,
            store,
            notifier,
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(300),
            clock,
            audit: None,
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-attempt time budget.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<Mutex<Box<dyn AuditSink>>>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Retry policy in use.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Process a claimed job by id.
    ///
    /// The job must be `InProgress`; anything else is an integrity error.
    pub async fn process(&self, job_id: &JobId) -> Result<WorkerOutcome, WorkerError> {
        let job = self.registry.get(job_id).await?;
        self.process_claimed(job).await
    }

    /// Process a job record returned by `claim`.
    pub async fn process_claimed(&self, job: Job) -> Result<WorkerOutcome, WorkerError> {
        if job.status != JobStatus::InProgress {
            return Err(RegistryError::InvalidTransition {
                job_id: job.job_id,
                from: job.status,
                action: "process",
            }
            .into());
        }

        tracing::debug!(
            job_id = %job.job_id,
            attempt = job.attempt_count,
            correlation_id = job.correlation_id.as_deref().unwrap_or(""),
            "starting attempt"
        );

        let attempt = match tokio::time::timeout(self.attempt_timeout, self.attempt(&job)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout(self.attempt_timeout)),
        };

        match attempt {
            Ok(result) => self.on_success(&job, result).await,
            Err(err) => self.on_failure(&job, &err).await,
        }
    }

    async fn attempt(&self, job: &Job) -> Result<ResultMetadata, AttemptError> {
        let source_ref = job.source_ref.trim();
        if source_ref.is_empty() {
            return Err(SourceError::Invalid("source reference is required".into()).into());
        }

        let metadata = self.source.resolve(source_ref).await?;
        let format = metadata.best_format().cloned().ok_or_else(|| {
            SourceError::Invalid(format!(
                "no mp4 rendition over https among {} formats",
                metadata.formats.len()
            ))
        })?;

        let stream = self.source.open(&format).await?;
        let storage_key = destination_key(job, &format);
        let stored = self.store.store(stream, &storage_key).await?;

        Ok(ResultMetadata {
            size_bytes: stored.size_bytes,
            storage_key: stored.storage_key,
            content_type: content_type_for(&format.ext).to_string(),
            extension: format.ext.to_ascii_lowercase(),
            source_id: metadata.source_id,
            title: metadata.title,
            description: metadata.description,
            thumbnail_url: metadata.thumbnail_url,
            uploader_id: metadata.uploader_id,
            uploader_name: metadata.uploader_name,
            published_at: metadata.published_at,
        })
    }

    async fn on_success(&self, job: &Job, result: ResultMetadata) -> Result<WorkerOutcome, WorkerError> {
        let size = result.size_bytes;
        let completed = self.registry.complete(&job.job_id, result).await?;
        self.record_audit(&completed, AuditAction::Complete, None);
        tracing::info!(job_id = %job.job_id, size_bytes = size, "job completed");

        let trigger = NotificationTrigger {
            job_id: completed.job_id.clone(),
            principal_id: completed.principal_id.clone(),
            correlation_id: completed.correlation_id.clone(),
        };
        let notification_enqueued = match self.notifier.enqueue(trigger).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "failed to enqueue notification trigger");
                false
            }
        };

        Ok(WorkerOutcome::Completed {
            notification_enqueued,
        })
    }

    async fn on_failure(&self, job: &Job, err: &AttemptError) -> Result<WorkerOutcome, WorkerError> {
        if err.is_retryable() && !job.is_last_attempt() {
            let due_at_ms = self
                .retry
                .next_due_at_ms(self.clock.now_ms(), job.attempt_count);
            let updated = self.registry.schedule_retry(&job.job_id, due_at_ms).await?;
            if updated.status == JobStatus::Failed {
                let reason = updated.failure_reason.clone().unwrap_or_else(|| err.to_string());
                self.record_audit(&updated, AuditAction::Fail, Some(reason.clone()));
                return Ok(WorkerOutcome::Failed { reason });
            }
            self.record_audit(&updated, AuditAction::Retry, Some(format!("due_at_ms={due_at_ms}")));
            tracing::warn!(
                job_id = %job.job_id,
                attempt = updated.attempt_count,
                max_attempts = updated.max_attempts,
                due_at_ms = %due_at_ms,
                error = %err,
                "attempt failed, retry scheduled"
            );
            return Ok(WorkerOutcome::RetryScheduled {
                attempt_count: updated.attempt_count,
                due_at_ms,
            });
        }

        let reason = if err.is_retryable() {
            format!(
                "attempts exhausted ({}/{}): {err}",
                job.attempt_count.saturating_add(1),
                job.max_attempts
            )
        } else {
            err.to_string()
        };
        let failed = self.registry.mark_failed(&job.job_id, &reason).await?;
        self.record_audit(&failed, AuditAction::Fail, Some(reason.clone()));
        tracing::error!(job_id = %job.job_id, reason = %reason, "job failed");
        Ok(WorkerOutcome::Failed { reason })
    }

    fn record_audit(&self, job: &Job, action: AuditAction, detail: Option<String>) {
        if let Some(audit) = &self.audit {
            audit.lock().record(build_audit_event(
                job.job_id.as_str(),
                job.principal_id.as_str(),
                action,
                detail,
                self.clock.now_ms(),
            ));
        }
    }
}

#[async_trait]
impl JobDispatcher for Worker {
    async fn dispatch(&self, job: Job) -> Result<(), DispatchError> {
        self.process_claimed(job).await?;
        Ok(())
    }
}

/// Object key for a job's media: `<principal>/<job>.<ext>`.
fn destination_key(job: &Job, format: &MediaFormat) -> String {
    format!(
        "{}/{}.{}",
        job.principal_id,
        job.job_id,
        format.ext.to_ascii_lowercase()
    )
}

fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
