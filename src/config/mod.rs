//! Configuration models for the scheduler, retries, worker, fan-out and pruner.

pub mod orchestrator;

pub use orchestrator::{
    CapabilityManifest, FanoutConfig, Operation, OrchestratorConfig, PrunerConfig, RetryConfig,
    SchedulerConfig, WorkerConfig, CLAIM_TTL_MARGIN_SECS,
};
