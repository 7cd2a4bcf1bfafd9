//! Orchestrator configuration structures.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, PrunerLimits, RetryPolicy, SchedulerLimits};

/// Prefix of environment variables read by [`OrchestratorConfig::from_env`].
pub const ENV_PREFIX: &str = "MEDIA_JOBS_";

/// Slack a claim must outlive the attempt timeout by before it may be reclaimed.
pub const CLAIM_TTL_MARGIN_SECS: u64 = 60;

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between scheduler runs.
    pub interval_secs: u64,
    /// Jobs dispatched concurrently per batch.
    pub batch_size: usize,
    /// Milliseconds to wait between batches.
    pub pacing_ms: u64,
    /// Registry page size for due scans.
    pub page_size: usize,
    /// Seconds after which an `InProgress` claim is reclaimed.
    pub claim_ttl_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_size: 5,
            pacing_ms: 1_000,
            page_size: 100,
            claim_ttl_secs: 900,
        }
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval_secs must be greater than 0".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".into());
        }
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".into());
        }
        if self.claim_ttl_secs == 0 {
            return Err("claim_ttl_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Interval between runs.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Runtime limits derived from this configuration.
    #[must_use]
    pub const fn limits(&self) -> SchedulerLimits {
        SchedulerLimits {
            batch_size: self.batch_size,
            pacing_delay: Duration::from_millis(self.pacing_ms),
            page_size: self.page_size,
            claim_ttl: Duration::from_secs(self.claim_ttl_secs),
        }
    }
}

/// Retry/backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on the base delay in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Fraction of the base delay added as jitter.
    pub jitter_ratio: f64,
    /// Attempt bound given to jobs that do not specify one.
    pub default_max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 30_000,
            max_delay_ms: 3_600_000,
            multiplier: 2.0,
            jitter_ratio: 0.2,
            default_max_attempts: 3,
        }
    }
}

impl RetryConfig {
    /// Backoff policy derived from this configuration.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            jitter_ratio: self.jitter_ratio,
        }
    }

    /// Validate retry configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_max_attempts == 0 {
            return Err("default_max_attempts must be greater than 0".into());
        }
        self.policy().validate()
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Time budget of one fetch-and-persist attempt in seconds.
    pub attempt_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: 300,
        }
    }
}

impl WorkerConfig {
    /// Validate worker configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.attempt_timeout_secs == 0 {
            return Err("attempt_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }
}

/// Notification fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Time budget of one delivery in milliseconds.
    pub delivery_timeout_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: 10_000,
        }
    }
}

impl FanoutConfig {
    /// Validate fan-out configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.delivery_timeout_ms == 0 {
            return Err("delivery_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Channel pruner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrunerConfig {
    /// Seconds between pruner runs.
    pub interval_secs: u64,
    /// Directory page size.
    pub page_size: usize,
    /// Probes in flight at once.
    pub probe_concurrency: usize,
    /// Time budget of one probe in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for PrunerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 86_400,
            page_size: 100,
            probe_concurrency: num_cpus::get().max(1) * 4,
            probe_timeout_ms: 10_000,
        }
    }
}

impl PrunerConfig {
    /// Validate pruner configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval_secs must be greater than 0".into());
        }
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".into());
        }
        if self.probe_concurrency == 0 {
            return Err("probe_concurrency must be greater than 0".into());
        }
        if self.probe_timeout_ms == 0 {
            return Err("probe_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Interval between runs.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Runtime limits derived from this configuration.
    #[must_use]
    pub const fn limits(&self) -> PrunerLimits {
        PrunerLimits {
            page_size: self.page_size,
            probe_concurrency: self.probe_concurrency,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

/// Operation a deployable unit is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Periodic scheduler runs.
    RunScheduler,
    /// Worker invocations for claimed jobs.
    ProcessJob,
    /// Notification fan-out.
    DeliverNotifications,
    /// Periodic channel pruning.
    PruneChannels,
}

/// Statically declared capabilities of one deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    /// Deployable unit name.
    pub unit: String,
    /// Operations the unit may run.
    pub operations: Vec<Operation>,
}

impl CapabilityManifest {
    /// Whether the unit may run `operation`.
    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

/// Root orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Scheduler section.
    pub scheduler: SchedulerConfig,
    /// Retry section.
    pub retry: RetryConfig,
    /// Worker section.
    pub worker: WorkerConfig,
    /// Fan-out section.
    pub fanout: FanoutConfig,
    /// Pruner section.
    pub pruner: PrunerConfig,
    /// Capability manifests of the deployable units.
    pub capabilities: Vec<CapabilityManifest>,
}

impl OrchestratorConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.scheduler
            .validate()
            .map_err(|e| format!("scheduler invalid: {e}"))?;
        self.retry.validate().map_err(|e| format!("retry invalid: {e}"))?;
        self.worker.validate().map_err(|e| format!("worker invalid: {e}"))?;
        self.fanout.validate().map_err(|e| format!("fanout invalid: {e}"))?;
        self.pruner.validate().map_err(|e| format!("pruner invalid: {e}"))?;
        let min_ttl = self.worker.attempt_timeout_secs.saturating_add(CLAIM_TTL_MARGIN_SECS);
        if self.scheduler.claim_ttl_secs < min_ttl {
            return Err(format!(
                "scheduler invalid: claim_ttl_secs ({}) must be at least attempt_timeout_secs + {CLAIM_TTL_MARGIN_SECS} ({min_ttl})",
                self.scheduler.claim_ttl_secs
            ));
        }
        for manifest in &self.capabilities {
            if manifest.unit.trim().is_empty() {
                return Err("capability manifest unit must not be empty".into());
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Capability manifest for a deployable unit.
    #[must_use]
    pub fn manifest(&self, unit: &str) -> Option<&CapabilityManifest> {
        self.capabilities.iter().find(|m| m.unit == unit)
    }

    /// Load configuration from the environment.
    ///
    /// Reads a `.env` file if present. `MEDIA_JOBS_CONFIG` may name a JSON
    /// file used as the base; individual `MEDIA_JOBS_*` variables override it.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = match std::env::var(format!("{ENV_PREFIX}CONFIG")) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        env_override("SCHEDULER_INTERVAL_SECS", &mut cfg.scheduler.interval_secs)?;
        env_override("BATCH_SIZE", &mut cfg.scheduler.batch_size)?;
        env_override("PACING_MS", &mut cfg.scheduler.pacing_ms)?;
        env_override("PAGE_SIZE", &mut cfg.scheduler.page_size)?;
        env_override("CLAIM_TTL_SECS", &mut cfg.scheduler.claim_ttl_secs)?;
        env_override("RETRY_INITIAL_DELAY_MS", &mut cfg.retry.initial_delay_ms)?;
        env_override("RETRY_MAX_DELAY_MS", &mut cfg.retry.max_delay_ms)?;
        env_override("RETRY_MULTIPLIER", &mut cfg.retry.multiplier)?;
        env_override("RETRY_JITTER_RATIO", &mut cfg.retry.jitter_ratio)?;
        env_override("MAX_ATTEMPTS", &mut cfg.retry.default_max_attempts)?;
        env_override("ATTEMPT_TIMEOUT_SECS", &mut cfg.worker.attempt_timeout_secs)?;
        env_override("DELIVERY_TIMEOUT_MS", &mut cfg.fanout.delivery_timeout_ms)?;
        env_override("PRUNER_INTERVAL_SECS", &mut cfg.pruner.interval_secs)?;
        env_override("PROBE_CONCURRENCY", &mut cfg.pruner.probe_concurrency)?;
        env_override("PROBE_TIMEOUT_MS", &mut cfg.pruner.probe_timeout_ms)?;

        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn env_override<T>(name: &str, target: &mut T) -> AppResult<()>
where
    T: FromStr,
    T::Err: Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    if let Ok(raw) = std::env::var(&key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}"))?;
    }
    Ok(())
}
