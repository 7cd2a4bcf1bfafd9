//! # Prometheus Media Jobs
//!
//! Lifecycle orchestration for retryable media download jobs.
//!
//! A job moves through `Pending → InProgress → Completed | Scheduled | Failed`.
//! The [`core::Scheduler`] periodically discovers due jobs, claims each one with
//! a conditional write and hands it to the [`core::Worker`], which fetches the
//! media, persists it and records exactly one outcome. Failed attempts are
//! retried with exponential backoff until the attempt budget runs out.
//! Completed jobs trigger [`core::NotificationFanout`], which delivers to every
//! channel of the job's principal and reports the channels that failed so
//! callers can redeliver only those. The [`core::ChannelPruner`] removes
//! channels the transport reports as permanently invalid.
//!
//! ## Components
//!
//! - **Job Registry**: conditional transitions and a paged due-job index
//! - **Scheduler**: dedup, batches of five, pacing between batches, per-source counters
//! - **Worker**: fetch, best-format selection, persist, backoff on failure
//! - **Fan-out**: per-channel isolation and partial-batch acknowledgment
//! - **Pruner**: paged, restartable probe-and-delete
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_media_jobs::builders::{build_orchestrator, Collaborators};
//! use prometheus_media_jobs::config::OrchestratorConfig;
//! use prometheus_media_jobs::runtime::{Shutdown, TokioSpawner};
//!
//! let cfg = OrchestratorConfig::from_env()?;
//! let orchestrator = build_orchestrator(&cfg, collaborators, None)?;
//! let shutdown = Shutdown::new();
//! orchestrator.spawn_loops(&TokioSpawner::current(), None, &shutdown.subscribe());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Job lifecycle model, collaborator contracts and orchestration engines.
pub mod core;
/// Configuration models for the scheduler, retries, worker, fan-out and pruner.
pub mod config;
/// Builders to construct orchestrator components from configuration.
pub mod builders;
/// Infrastructure adapters for the registry, directory and notification queue.
pub mod infra;
/// Runtime adapters: spawning, periodic loops and the batch API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
