//! Batch-oriented entry point for notification fan-out.
//!
//! Callers deliver triggers in batches with at-least-once semantics and
//! redeliver only the items listed in the response.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::NotificationFanout;
use crate::util::JobId;

/// One trigger in a delivery batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Transport-assigned identifier echoed back on failure.
    pub item_id: String,
    /// Completed job to announce.
    pub job_id: JobId,
}

/// A batch of triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBatch {
    /// Records in delivery order.
    pub records: Vec<NotificationRecord>,
}

/// An item the caller must redeliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    /// The failed record's `item_id`.
    pub item_identifier: String,
}

/// Partial-batch acknowledgment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Items to redeliver; empty acknowledges the whole batch.
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// Run fan-out for every record concurrently and report the records that
/// errored or left at least one channel undelivered.
pub async fn handle_notification_batch(
    fanout: &NotificationFanout,
    batch: NotificationBatch,
) -> BatchResponse {
    let outcomes = join_all(batch.records.iter().map(|record| async move {
        match fanout.deliver(&record.job_id).await {
            Ok(report) if report.is_success() => true,
            Ok(report) => {
                tracing::warn!(
                    item_id = %record.item_id,
                    job_id = %record.job_id,
                    failed_channels = report.failed_channel_ids.len(),
                    "notification item partially delivered"
                );
                false
            }
            Err(e) => {
                tracing::error!(item_id = %record.item_id, job_id = %record.job_id, error = %e, "notification item failed");
                false
            }
        }
    }))
    .await;

    let batch_item_failures = batch
        .records
        .into_iter()
        .zip(outcomes)
        .filter(|(_, delivered)| !delivered)
        .map(|(record, _)| BatchItemFailure {
            item_identifier: record.item_id,
        })
        .collect();
    BatchResponse {
        batch_item_failures,
    }
}
