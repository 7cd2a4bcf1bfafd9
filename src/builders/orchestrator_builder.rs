//! Wires the scheduler, worker, fan-out and pruner from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::Mutex;

use crate::config::{CapabilityManifest, Operation, OrchestratorConfig};
use crate::core::{
    AppResult, AuditSink, ChannelPruner, Job, JobDispatcher, JobRegistry, MediaStore, NewJob,
    NotificationDispatch, NotificationFanout, NotificationTransport, RecipientDirectory,
    RegistryError, Scheduler, SourceFetcher, Worker,
};
use crate::runtime::{spawn_pruner_loop, spawn_scheduler_loop, Spawn};
use crate::util::{Clock, JobId, PrincipalId};

/// External collaborators shared by the components.
#[derive(Clone)]
pub struct Collaborators {
    /// Job record store.
    pub registry: Arc<dyn JobRegistry>,
    /// Channel and association store.
    pub directory: Arc<dyn RecipientDirectory>,
    /// Remote media source.
    pub source: Arc<dyn SourceFetcher>,
    /// Durable object storage.
    pub store: Arc<dyn MediaStore>,
    /// Push transport.
    pub transport: Arc<dyn NotificationTransport>,
    /// Queue feeding notification fan-out.
    pub notifier: Arc<dyn NotificationDispatch>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Fully wired components.
pub struct Orchestrator {
    /// Due-job scheduler.
    pub scheduler: Arc<Scheduler>,
    /// Fetch-and-persist worker, also the scheduler's dispatcher.
    pub worker: Arc<Worker>,
    /// Completion notification fan-out.
    pub fanout: Arc<NotificationFanout>,
    /// Stale channel pruner.
    pub pruner: Arc<ChannelPruner>,
    registry: Arc<dyn JobRegistry>,
    default_max_attempts: u32,
    scheduler_interval: Duration,
    pruner_interval: Duration,
}

impl Orchestrator {
    /// Register a new `Pending` job bounded by the configured default attempt count.
    pub async fn submit(
        &self,
        job_id: impl Into<JobId> + Send,
        principal_id: impl Into<PrincipalId> + Send,
        source_ref: impl Into<String> + Send,
    ) -> Result<Job, RegistryError> {
        let request = NewJob::new(job_id, principal_id, source_ref, self.default_max_attempts);
        self.registry.create(request).await
    }

    /// Start the periodic loops the manifest allows; without a manifest both
    /// loops start.
    pub fn spawn_loops<S: Spawn>(
        &self,
        spawner: &S,
        manifest: Option<&CapabilityManifest>,
        shutdown: &tokio::sync::watch::Receiver<bool>,
    ) {
        let allows = |op| manifest.is_none_or(|m| m.allows(op));
        if allows(Operation::RunScheduler) {
            spawn_scheduler_loop(
                spawner,
                Arc::clone(&self.scheduler),
                self.scheduler_interval,
                shutdown.clone(),
            );
        }
        if allows(Operation::PruneChannels) {
            spawn_pruner_loop(
                spawner,
                Arc::clone(&self.pruner),
                self.pruner_interval,
                shutdown.clone(),
            );
        }
    }
}

/// Validate `cfg` and build every component around `deps`.
pub fn build_orchestrator(
    cfg: &OrchestratorConfig,
    deps: Collaborators,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
) -> AppResult<Orchestrator> {
    cfg.validate().map_err(|e| anyhow!("config invalid: {e}"))?;

    let mut worker = Worker::new(
        Arc::clone(&deps.registry),
        deps.source,
        deps.store,
        deps.notifier,
        Arc::clone(&deps.clock),
    )
    .with_retry_policy(cfg.retry.policy())
    .with_attempt_timeout(Duration::from_secs(cfg.worker.attempt_timeout_secs));
    if let Some(audit) = &audit {
        worker = worker.with_audit(Arc::clone(audit));
    }
    let worker = Arc::new(worker);

    let dispatcher: Arc<dyn JobDispatcher> = worker.clone();
    let mut scheduler = Scheduler::new(
        Arc::clone(&deps.registry),
        dispatcher,
        deps.clock,
        cfg.scheduler.limits(),
    );
    if let Some(audit) = audit {
        scheduler = scheduler.with_audit(audit);
    }

    let fanout = NotificationFanout::new(
        Arc::clone(&deps.registry),
        Arc::clone(&deps.directory),
        Arc::clone(&deps.transport),
    )
    .with_delivery_timeout(Duration::from_millis(cfg.fanout.delivery_timeout_ms));

    let pruner = ChannelPruner::new(deps.directory, deps.transport, cfg.pruner.limits());

    tracing::debug!(
        batch_size = cfg.scheduler.batch_size,
        max_attempts = cfg.retry.default_max_attempts,
        "orchestrator built"
    );

    Ok(Orchestrator {
        scheduler: Arc::new(scheduler),
        worker,
        fanout: Arc::new(fanout),
        pruner: Arc::new(pruner),
        registry: deps.registry,
        default_max_attempts: cfg.retry.default_max_attempts,
        scheduler_interval: cfg.scheduler.interval(),
        pruner_interval: cfg.pruner.interval(),
    })
}
