//! Lifecycle audit trail.
//!
//! The scheduler and worker record every state transition they cause. The
//! in-memory sink keeps a bounded window for tests and local development;
//! hosts plug their own sink in for durable history.

use std::collections::VecDeque;
use std::fmt;


/// Transition recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Scheduler claimed the job.
    Claim,
    /// Worker recorded success.
    Complete,
    /// Worker scheduled another attempt.
    Retry,
    /// Worker recorded a terminal failure.
    Fail,
    /// Reconciliation sweep took back a stale claim.
    Reclaim,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Claim => "claim",
            Self::Complete => "complete",
            Self::Retry => "retry",
            Self::Fail => "fail",
            Self::Reclaim => "reclaim",
        })
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related job identifier.
    pub job_id: String,
    /// Owning principal.
    pub principal_id: String,
    /// Transition recorded.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context (failure reason, next due time).
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards events to another sink shared behind a mutex, so
/// callers can keep a handle for inspection.
pub struct SharedAuditSink<S> {
    inner: std::sync::Arc<parking_lot::Mutex<S>>,
}

impl<S> SharedAuditSink<S> {
    /// Wrap a shared sink.
    pub const fn new(inner: std::sync::Arc<parking_lot::Mutex<S>>) -> Self {
        Self { inner }
    }
}

impl<S: AuditSink> AuditSink for SharedAuditSink<S> {
    fn record(&mut self, event: AuditEvent) {
        self.inner.lock().record(event);
    }
}

/// Helper to build an audit event with a fresh id, stamped at `at_ms`.
pub fn build_audit_event(
    job_id: impl Into<String>,
    principal_id: impl Into<String>,
    action: AuditAction,
    detail: Option<String>,
    at_ms: u128,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        job_id: job_id.into(),
        principal_id: principal_id.into(),
        action,
        created_at_ms: at_ms,
        detail,
    }
}
