//! Tests for the in-memory notification queue

use prometheus_media_jobs::core::{NotificationDispatch, NotificationTrigger};
use prometheus_media_jobs::infra::InMemoryNotificationQueue;
use prometheus_media_jobs::util::{JobId, PrincipalId};

fn trigger(job: &str, principal: &str) -> NotificationTrigger {
    NotificationTrigger {
        job_id: JobId::from(job),
        principal_id: PrincipalId::from(principal),
        correlation_id: None,
    }
}

#[tokio::test]
async fn test_pending_counts_by_principal() {
    let queue = InMemoryNotificationQueue::new();
    queue.enqueue(trigger("j1", "alice")).await.unwrap();
    queue.enqueue(trigger("j2", "bob")).await.unwrap();
    queue.enqueue(trigger("j3", "alice")).await.unwrap();

    assert_eq!(queue.pending_for(&PrincipalId::from("alice")), 2);
    assert_eq!(queue.pending_for(&PrincipalId::from("carol")), 0);
    assert_eq!(queue.len(), 3);

    let drained = queue.drain();
    assert_eq!(drained[2].job_id, JobId::from("j3"));
}

#[tokio::test]
async fn test_max_depth_rejects() {
    let queue = InMemoryNotificationQueue::with_max_depth(1);
    queue.enqueue(trigger("j1", "alice")).await.unwrap();
    assert!(queue.enqueue(trigger("j2", "alice")).await.is_err());

    let drained = queue.drain();
    assert_eq!(drained.len(), 1);
    assert!(queue.is_empty());
}
