//! Tests for orchestrator wiring

use std::sync::Arc;
use std::time::Duration;

use prometheus_media_jobs::builders::{build_orchestrator, Collaborators};
use prometheus_media_jobs::config::{CapabilityManifest, Operation, OrchestratorConfig};
use prometheus_media_jobs::core::{Channel, JobRegistry, JobStatus};
use prometheus_media_jobs::infra::{
    InMemoryJobRegistry, InMemoryNotificationQueue, InMemoryRecipientDirectory,
};
use prometheus_media_jobs::runtime::{
    handle_notification_batch, NotificationBatch, NotificationRecord, Shutdown, TokioSpawner,
};
use prometheus_media_jobs::util::{JobId, SystemClock};

use crate::common::{new_job, playable_metadata, FakeSource, FakeStore, FakeTransport};

struct Parts {
    registry: Arc<InMemoryJobRegistry>,
    directory: Arc<InMemoryRecipientDirectory>,
    queue: Arc<InMemoryNotificationQueue>,
    transport: Arc<FakeTransport>,
}

fn parts() -> (Parts, Collaborators) {
    let p = Parts {
        registry: Arc::new(InMemoryJobRegistry::new()),
        directory: Arc::new(InMemoryRecipientDirectory::new()),
        queue: Arc::new(InMemoryNotificationQueue::new()),
        transport: Arc::new(FakeTransport::default()),
    };
    let deps = Collaborators {
        registry: p.registry.clone(),
        directory: p.directory.clone(),
        source: Arc::new(FakeSource::new(playable_metadata())),
        store: Arc::new(FakeStore::default()),
        transport: p.transport.clone(),
        notifier: p.queue.clone(),
        clock: Arc::new(SystemClock),
    };
    (p, deps)
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_, deps) = parts();
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.batch_size = 0;
    let err = build_orchestrator(&cfg, deps, None).err().expect("config must be rejected");
    assert!(err.to_string().contains("config invalid"));
}

#[tokio::test]
async fn test_submit_applies_configured_attempt_bound() {
    let (p, deps) = parts();
    let mut cfg = OrchestratorConfig::default();
    cfg.retry.default_max_attempts = 7;
    let orchestrator = build_orchestrator(&cfg, deps, None).unwrap();

    let job = orchestrator.submit("j1", "alice", "vid-j1").await.unwrap();
    assert_eq!(job.max_attempts, 7);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(p.registry.get(&JobId::from("j1")).await.unwrap().max_attempts, 7);
}

#[tokio::test]
async fn test_built_components_run_a_job_end_to_end() {
    let (p, deps) = parts();
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.pacing_ms = 0;
    let orchestrator = build_orchestrator(&cfg, deps, None).unwrap();

    p.registry.create(new_job("j1", "alice")).await.unwrap();
    p.directory.register_channel("alice", Channel::new("c1", "tok-1", 0));

    let report = orchestrator.scheduler.run_once().await;
    assert_eq!(report.dispatched_count(), 1);
    assert_eq!(
        p.registry.get(&JobId::from("j1")).await.unwrap().status,
        JobStatus::Completed
    );

    let records = p
        .queue
        .drain()
        .into_iter()
        .enumerate()
        .map(|(i, t)| NotificationRecord {
            item_id: format!("msg-{i}"),
            job_id: t.job_id,
        })
        .collect();
    let response = handle_notification_batch(&orchestrator.fanout, NotificationBatch { records }).await;
    assert!(response.batch_item_failures.is_empty());
    assert_eq!(p.transport.sent.lock().len(), 1);

    let prune = orchestrator.pruner.run_once().await;
    assert_eq!(prune.checked, 1);
    assert_eq!(prune.pruned, 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_loops_respects_manifest() {
    let (p, deps) = parts();
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.pacing_ms = 0;
    let orchestrator = build_orchestrator(&cfg, deps, None).unwrap();
    p.registry.create(new_job("j1", "alice")).await.unwrap();
    p.directory.register_channel("alice", Channel::new("c1", "tok-1", 0));

    let manifest = CapabilityManifest {
        unit: "scheduler-fn".into(),
        operations: vec![Operation::RunScheduler, Operation::ProcessJob],
    };
    let shutdown = Shutdown::new();
    orchestrator.spawn_loops(&TokioSpawner::current(), Some(&manifest), &shutdown.subscribe());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        p.registry.get(&JobId::from("j1")).await.unwrap().status,
        JobStatus::Completed
    );
    assert!(p.transport.probed.lock().is_empty());
    shutdown.trigger();
}
