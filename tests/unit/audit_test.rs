//! Tests for audit sink

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_media_jobs::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, SharedAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    sink.record(build_audit_event("job1", "alice", AuditAction::Claim, None, 1_000));
    sink.record(build_audit_event(
        "job1",
        "alice",
        AuditAction::Retry,
        Some("due_at_ms=42".to_string()),
        2_000,
    ));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].job_id, "job1");
    assert_eq!(events[0].action, AuditAction::Claim);
    assert_eq!(events[1].detail.as_deref(), Some("due_at_ms=42"));
    assert_eq!((events[0].created_at_ms, events[1].created_at_ms), (1_000, 2_000));
    assert_ne!(events[0].event_id, events[1].event_id);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    for job in ["job1", "job2", "job3"] {
        sink.record(build_audit_event(job, "alice", AuditAction::Complete, None, 0));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].job_id, "job2");
    assert_eq!(events[1].job_id, "job3");
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("job1", "alice", AuditAction::Fail, None, 0));
    assert!(sink.events().is_empty());
}

#[test]
fn test_shared_sink_forwards() {
    let inner = Arc::new(Mutex::new(InMemoryAuditSink::new(4)));
    let mut shared = SharedAuditSink::new(inner.clone());
    shared.record(build_audit_event("job1", "alice", AuditAction::Reclaim, None, 0));
    assert_eq!(inner.lock().events().len(), 1);
    assert_eq!(AuditAction::Reclaim.to_string(), "reclaim");
}
