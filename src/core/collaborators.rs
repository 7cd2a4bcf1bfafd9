//! Contracts of the external collaborators the orchestrator drives.
//!
//! Source fetching, durable storage, the notification transport and the
//! dispatch queues live outside this crate; the engines only see these traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::core::{ChannelHealth, DispatchError, Job, NotifyError, SourceError, StorageError, TransportError};
use crate::util::{CorrelationId, JobId, PrincipalId};

/// Stream of media bytes flowing from the source to storage.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, SourceError>>;

/// One downloadable rendition of a media item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFormat {
    /// Source-specific format identifier.
    pub format_id: String,
    /// File extension, e.g. `mp4`.
    pub ext: String,
    /// Transfer protocol, e.g. `https`.
    pub protocol: String,
    /// Direct location of the rendition.
    pub url: String,
}

impl MediaFormat {
    /// Whether this rendition can be streamed into storage as-is.
    #[must_use]
    pub fn is_direct_mp4(&self) -> bool {
        self.ext.eq_ignore_ascii_case("mp4") && self.protocol.eq_ignore_ascii_case("https")
    }
}

/// Metadata resolved for a source reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Identifier of the media at its source.
    pub source_id: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Thumbnail location.
    pub thumbnail_url: Option<String>,
    /// Publication time (seconds since epoch).
    pub published_at: Option<i64>,
    /// Uploader identifier.
    pub uploader_id: Option<String>,
    /// Uploader display name.
    pub uploader_name: Option<String>,
    /// Available renditions in ascending order of quality.
    pub formats: Vec<MediaFormat>,
}

impl SourceMetadata {
    /// Highest-quality rendition that is an mp4 served over https.
    #[must_use]
    pub fn best_format(&self) -> Option<&MediaFormat> {
        self.formats.iter().rev().find(|f| f.is_direct_mp4())
    }
}

/// Where the storage collaborator put the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Bytes written.
    pub size_bytes: u64,
    /// Final object key.
    pub storage_key: String,
}

/// Message delivered to each channel once a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Completed job.
    pub job_id: JobId,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Key of the stored media.
    pub storage_key: Option<String>,
    /// Thumbnail to show alongside the notification.
    pub image_url: Option<String>,
    /// Correlation id copied from the job.
    pub correlation_id: Option<CorrelationId>,
}

impl NotificationPayload {
    /// Build the completion message for a job.
    #[must_use]
    pub fn for_completed_job(job: &Job) -> Self {
        let result = job.result.as_ref();
        let title = result
            .and_then(|r| r.title.clone())
            .unwrap_or_else(|| "Download complete".to_string());
        Self {
            job_id: job.job_id.clone(),
            body: format!("{title} is ready"),
            title,
            storage_key: result.map(|r| r.storage_key.clone()),
            image_url: result.and_then(|r| r.thumbnail_url.clone()),
            correlation_id: job.correlation_id.clone(),
        }
    }
}

/// Request to fan out notifications for a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTrigger {
    /// Completed job.
    pub job_id: JobId,
    /// Owner whose channels receive the message.
    pub principal_id: PrincipalId,
    /// Correlation id copied from the job.
    pub correlation_id: Option<CorrelationId>,
}

/// Resolves and streams remote media.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Resolve metadata (including available formats) for a source reference.
    async fn resolve(&self, source_ref: &str) -> Result<SourceMetadata, SourceError>;

    /// Open a byte stream for one rendition.
    async fn open(&self, format: &MediaFormat) -> Result<ByteStream, SourceError>;
}

/// Durable storage for fetched media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Consume `stream` into the object at `destination_key`.
    async fn store(&self, stream: ByteStream, destination_key: &str) -> Result<StoredObject, StorageError>;
}

/// Push/messaging transport used for deliveries and liveness probes.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver a payload to a channel handle.
    async fn send(&self, handle: &str, payload: &NotificationPayload) -> Result<(), TransportError>;

    /// Check whether a handle is still accepted, without notifying the user.
    async fn probe(&self, handle: &str) -> Result<ChannelHealth, TransportError>;
}

/// Queue that triggers notification fan-out for completed jobs.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// Enqueue a fan-out trigger.
    async fn enqueue(&self, trigger: NotificationTrigger) -> Result<(), NotifyError>;
}

/// Hands a claimed job to whatever executes it.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Execute (or enqueue execution of) a job already moved to `InProgress`.
    async fn dispatch(&self, job: Job) -> Result<(), DispatchError>;
}
