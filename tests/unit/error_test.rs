//! Tests for error types

use std::time::Duration;

use prometheus_media_jobs::core::{
    AttemptError, DirectoryError, DispatchError, FanoutError, JobStatus, RegistryError,
    SourceError, StorageError, TransportError, WorkerError,
};
use prometheus_media_jobs::util::{ChannelId, JobId};

#[test]
fn test_registry_error_messages() {
    assert_eq!(
        RegistryError::ClaimLost(JobId::from("j1")).to_string(),
        "claim lost: j1"
    );
    let err = RegistryError::InvalidTransition {
        job_id: JobId::from("j1"),
        from: JobStatus::Completed,
        action: "complete",
    };
    assert_eq!(
        err.to_string(),
        "invalid transition for job j1: cannot complete from completed"
    );
    assert!(err.is_integrity_violation());
    assert!(!RegistryError::Backend("down".into()).is_integrity_violation());
}

#[test]
fn test_attempt_error_retryability() {
    assert!(AttemptError::from(StorageError("throttled".into())).is_retryable());
    assert!(AttemptError::from(SourceError::Unavailable("dns".into())).is_retryable());
    assert!(AttemptError::Timeout(Duration::from_secs(300)).is_retryable());
    assert!(!AttemptError::from(SourceError::Invalid("no formats".into())).is_retryable());
}

#[test]
fn test_transparent_wrapping() {
    let err = DispatchError::from(WorkerError::from(RegistryError::NotFound(JobId::from("x"))));
    assert_eq!(err.to_string(), "job not found: x");
    assert!(!err.is_integrity_violation());

    let err = FanoutError::from(DirectoryError::NotFound(ChannelId::from("c9")));
    assert_eq!(err.to_string(), "channel not found: c9");
}

#[test]
fn test_transport_error_display() {
    assert_eq!(TransportError::Disabled.to_string(), "channel disabled");
    assert_eq!(
        TransportError::Transient("503".into()).to_string(),
        "transport error: 503"
    );
}
