//! Per-channel notification delivery for completed jobs.
//!
//! Delivery waits for every channel and reports the ones that failed, so an
//! at-least-once caller can redeliver only those (partial-batch
//! acknowledgment). One channel's error never stops the others.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;

use crate::core::{
    Channel, FanoutError, JobRegistry, JobStatus, NotificationPayload, NotificationTransport,
    RecipientDirectory, TransportError,
};
use crate::util::{ChannelId, JobId};

/// Why delivery to a channel failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum ChannelFailureReason {
    /// The channel has no usable handle; nothing was sent.
    MissingHandle,
    /// The transport reported the channel as permanently invalid.
    Disabled,
    /// Temporary transport failure.
    Transient(String),
    /// The attempt exceeded its time budget.
    Timeout,
}

impl fmt::Display for ChannelFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHandle => f.write_str("missing handle"),
            Self::Disabled => f.write_str("channel disabled"),
            Self::Transient(e) => write!(f, "transient: {e}"),
            Self::Timeout => f.write_str("timed out"),
        }
    }
}

/// A channel that did not receive the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    /// Channel that failed.
    pub channel_id: ChannelId,
    /// Failure classification.
    pub reason: ChannelFailureReason,
}

/// Per-channel outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutReport {
    /// Channels that received the payload.
    pub delivered: Vec<ChannelId>,
    /// Channels to retry; empty means full success.
    pub failed_channel_ids: Vec<ChannelId>,
    /// Classification of each failure, in the same order as `failed_channel_ids`.
    pub failures: Vec<ChannelFailure>,
}

impl FanoutReport {
    /// Whether every channel received the payload.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_channel_ids.is_empty()
    }
}

/// Delivers completion notifications to every channel of a job's principal.
pub struct NotificationFanout {
    registry: Arc<dyn JobRegistry>,
    directory: Arc<dyn RecipientDirectory>,
    transport: Arc<dyn NotificationTransport>,
    delivery_timeout: Duration,
}

impl NotificationFanout {
    /// Create a fan-out from its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        directory: Arc<dyn RecipientDirectory>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            registry,
            directory,
            transport,
            delivery_timeout: Duration::from_secs(10),
        }
    }

    /// Override the per-delivery time budget.
    #[must_use]
    pub const fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Deliver the completion message for `job_id` to all of its principal's channels.
    pub async fn deliver(&self, job_id: &JobId) -> Result<FanoutReport, FanoutError> {
        let job = self.registry.get(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(FanoutError::NotCompleted {
                job_id: job.job_id,
                status: job.status,
            });
        }

        let channels = self.directory.channels_for(&job.principal_id).await?;
        if channels.is_empty() {
            tracing::info!(job_id = %job_id, principal_id = %job.principal_id, "no channels registered; nothing to deliver");
            return Ok(FanoutReport::default());
        }

        let payload = NotificationPayload::for_completed_job(&job);
        let outcomes = join_all(
            channels
                .iter()
                .map(|channel| self.deliver_one(channel, &payload)),
        )
        .await;

        let mut report = FanoutReport::default();
        for (channel, outcome) in channels.into_iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered.push(channel.channel_id),
                Err(reason) => {
                    tracing::warn!(job_id = %job_id, channel_id = %channel.channel_id, reason = %reason, "delivery failed");
                    report.failed_channel_ids.push(channel.channel_id.clone());
                    report.failures.push(ChannelFailure {
                        channel_id: channel.channel_id,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            job_id = %job_id,
            delivered = report.delivered.len(),
            failed = report.failed_channel_ids.len(),
            "fan-out finished"
        );
        Ok(report)
    }

    async fn deliver_one(
        &self,
        channel: &Channel,
        payload: &NotificationPayload,
    ) -> Result<(), ChannelFailureReason> {
        let Some(handle) = channel.usable_handle() else {
            return Err(ChannelFailureReason::MissingHandle);
        };
        match tokio::time::timeout(self.delivery_timeout, self.transport.send(handle, payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(TransportError::Disabled)) => Err(ChannelFailureReason::Disabled),
            Ok(Err(TransportError::Transient(e))) => Err(ChannelFailureReason::Transient(e)),
            Ok(Err(TransportError::Timeout(_))) | Err(_) => Err(ChannelFailureReason::Timeout),
        }
    }
}
