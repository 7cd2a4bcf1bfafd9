//! Removal of channels the transport reports as permanently invalid.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::core::{
    Channel, ChannelCursor, ChannelHealth, DirectoryError, NotificationTransport,
    RecipientDirectory, TransportError,
};
use crate::util::ChannelId;

/// Runtime limits for a pruner run.
#[derive(Debug, Clone)]
pub struct PrunerLimits {
    /// Channels fetched per directory page.
    pub page_size: usize,
    /// Probes in flight at once.
    pub probe_concurrency: usize,
    /// Time budget of a single probe.
    pub probe_timeout: Duration,
}

impl Default for PrunerLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            probe_concurrency: num_cpus::get().max(1) * 4,
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// A channel the pruner could not classify or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneError {
    /// Affected channel, `None` for enumeration failures.
    pub channel_id: Option<ChannelId>,
    /// Error description.
    pub message: String,
}

/// Result of one pruner run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    /// Channels examined.
    pub checked: usize,
    /// Channels deleted.
    pub pruned: usize,
    /// Ids of the deleted channels.
    pub pruned_channel_ids: Vec<ChannelId>,
    /// Errors recorded; the affected channels were left untouched.
    pub errors: Vec<PruneError>,
    /// Where to resume if enumeration stopped early.
    pub resume_from: Option<ChannelCursor>,
}

enum Verdict {
    Alive,
    Pruned,
    AlreadyGone,
}

/// Probes every channel and deletes the ones confirmed dead.
pub struct ChannelPruner {
    directory: Arc<dyn RecipientDirectory>,
    transport: Arc<dyn NotificationTransport>,
    limits: PrunerLimits,
}

impl ChannelPruner {
    /// Create a pruner from its collaborators.
    #[must_use]
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        transport: Arc<dyn NotificationTransport>,
        limits: PrunerLimits,
    ) -> Self {
        Self {
            directory,
            transport,
            limits,
        }
    }

    /// Examine every channel once.
    pub async fn run_once(&self) -> PruneReport {
        self.run_from(None).await
    }

    /// Examine channels after `cursor`; pass a previous `resume_from` to
    /// continue an interrupted run.
    pub async fn run_from(&self, cursor: Option<ChannelCursor>) -> PruneReport {
        let mut report = PruneReport::default();
        let mut cursor = cursor;
        let page_size = self.limits.page_size.max(1);
        let concurrency = self.limits.probe_concurrency.max(1);

        loop {
            let page = match self.directory.list_channels(cursor.clone(), page_size).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(error = %e, "failed to enumerate channels; stopping run");
                    report.errors.push(PruneError {
                        channel_id: None,
                        message: e.to_string(),
                    });
                    report.resume_from = cursor;
                    break;
                }
            };

            let results: Vec<(ChannelId, Result<Verdict, String>)> = stream::iter(page.channels)
                .map(|channel| async move {
                    let verdict = self.check(&channel).await;
                    (channel.channel_id, verdict)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (channel_id, verdict) in results {
                report.checked += 1;
                match verdict {
                    Ok(Verdict::Alive | Verdict::AlreadyGone) => {}
                    Ok(Verdict::Pruned) => {
                        report.pruned += 1;
                        report.pruned_channel_ids.push(channel_id);
                    }
                    Err(message) => {
                        tracing::warn!(channel_id = %channel_id, error = %message, "channel check failed");
                        report.errors.push(PruneError {
                            channel_id: Some(channel_id),
                            message,
                        });
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(
            checked = report.checked,
            pruned = report.pruned,
            errors = report.errors.len(),
            "channel pruning finished"
        );
        report
    }

    async fn check(&self, channel: &Channel) -> Result<Verdict, String> {
        let Some(handle) = channel.usable_handle() else {
            return Err("missing handle".into());
        };

        let health = match tokio::time::timeout(self.limits.probe_timeout, self.transport.probe(handle)).await {
            Ok(Ok(health)) => health,
            Ok(Err(TransportError::Disabled)) => ChannelHealth::Disabled,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => {
                return Err(TransportError::Timeout(self.limits.probe_timeout).to_string());
            }
        };

        match health {
            ChannelHealth::Alive => Ok(Verdict::Alive),
            ChannelHealth::Disabled => match self.directory.delete_channel(&channel.channel_id).await {
                Ok(()) => {
                    tracing::info!(channel_id = %channel.channel_id, "pruned disabled channel");
                    Ok(Verdict::Pruned)
                }
                Err(DirectoryError::NotFound(_)) => {
                    tracing::debug!(channel_id = %channel.channel_id, "disabled channel already removed");
                    Ok(Verdict::AlreadyGone)
                }
                Err(e) => Err(format!("delete failed: {e}")),
            },
        }
    }
}
