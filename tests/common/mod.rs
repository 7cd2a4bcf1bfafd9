//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use prometheus_media_jobs::core::{
    ByteStream, ChannelHealth, DispatchError, Job, JobDispatcher, JobRegistry, JobStatus,
    MediaFormat, MediaStore, NewJob, NotificationPayload, NotificationTransport, ResultMetadata,
    SourceError, SourceFetcher, SourceMetadata, StorageError, StoredObject, TransportError,
};
use prometheus_media_jobs::util::JobId;

pub const CHUNK: usize = 512;

pub fn format(id: &str, ext: &str, protocol: &str) -> MediaFormat {
    MediaFormat {
        format_id: id.into(),
        ext: ext.into(),
        protocol: protocol.into(),
        url: format!("https://cdn.example/{id}"),
    }
}

pub fn playable_metadata() -> SourceMetadata {
    SourceMetadata {
        source_id: Some("vid-42".into()),
        title: Some("Sunset timelapse".into()),
        description: Some("Shot on a hill".into()),
        thumbnail_url: Some("https://img.example/42.jpg".into()),
        published_at: Some(1_700_000_000),
        uploader_id: Some("u-7".into()),
        uploader_name: Some("Ada".into()),
        formats: vec![
            format("18", "mp4", "https"),
            format("137", "mp4", "https"),
            format("hls", "mp4", "m3u8_native"),
        ],
    }
}

/// Source returning fixed metadata and a two-chunk body.
pub struct FakeSource {
    pub metadata: SourceMetadata,
    pub resolve_error: Mutex<Option<SourceError>>,
    pub hang: bool,
    pub opened: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(metadata: SourceMetadata) -> Self {
        Self {
            metadata,
            resolve_error: Mutex::new(None),
            hang: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SourceError) -> Self {
        let source = Self::new(playable_metadata());
        *source.resolve_error.lock() = Some(error);
        source
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(playable_metadata())
        }
    }
}

#[async_trait]
impl SourceFetcher for FakeSource {
    async fn resolve(&self, _source_ref: &str) -> Result<SourceMetadata, SourceError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        if let Some(err) = self.resolve_error.lock().clone() {
            return Err(err);
        }
        Ok(self.metadata.clone())
    }

    async fn open(&self, format: &MediaFormat) -> Result<ByteStream, SourceError> {
        self.opened.lock().push(format.format_id.clone());
        Ok(stream::iter(vec![Ok(vec![0_u8; CHUNK]), Ok(vec![1_u8; CHUNK])]).boxed())
    }
}

/// Store that drains the stream and remembers sizes per key.
#[derive(Default)]
pub struct FakeStore {
    pub fail_with: Mutex<Option<StorageError>>,
    pub objects: Mutex<HashMap<String, u64>>,
}

impl FakeStore {
    pub fn failing(message: &str) -> Self {
        let store = Self::default();
        *store.fail_with.lock() = Some(StorageError(message.into()));
        store
    }
}

#[async_trait]
impl MediaStore for FakeStore {
    async fn store(&self, mut stream: ByteStream, destination_key: &str) -> Result<StoredObject, StorageError> {
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }
        let mut size = 0_u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError(e.to_string()))?;
            size += chunk.len() as u64;
        }
        self.objects.lock().insert(destination_key.to_string(), size);
        Ok(StoredObject {
            size_bytes: size,
            storage_key: destination_key.to_string(),
        })
    }
}

/// How the fake transport treats a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    Disabled,
    DisabledError,
    Transient,
    Hang,
}

/// Transport whose outcome is chosen per handle; unknown handles succeed.
#[derive(Default)]
pub struct FakeTransport {
    pub behaviors: Mutex<HashMap<String, Behavior>>,
    pub sent: Mutex<Vec<(String, NotificationPayload)>>,
    pub probed: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn with(behaviors: &[(&str, Behavior)]) -> Self {
        let transport = Self::default();
        {
            let mut map = transport.behaviors.lock();
            for (handle, behavior) in behaviors {
                map.insert((*handle).to_string(), *behavior);
            }
        }
        transport
    }

    fn behavior(&self, handle: &str) -> Behavior {
        self.behaviors.lock().get(handle).copied().unwrap_or(Behavior::Ok)
    }

    pub fn sent_handles(&self) -> HashSet<String> {
        self.sent.lock().iter().map(|(h, _)| h.clone()).collect()
    }
}

#[async_trait]
impl NotificationTransport for FakeTransport {
    async fn send(&self, handle: &str, payload: &NotificationPayload) -> Result<(), TransportError> {
        match self.behavior(handle) {
            Behavior::Ok => {
                self.sent.lock().push((handle.to_string(), payload.clone()));
                Ok(())
            }
            Behavior::Disabled | Behavior::DisabledError => Err(TransportError::Disabled),
            Behavior::Transient => Err(TransportError::Transient("503".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(())
            }
        }
    }

    async fn probe(&self, handle: &str) -> Result<ChannelHealth, TransportError> {
        self.probed.lock().push(handle.to_string());
        match self.behavior(handle) {
            Behavior::Ok => Ok(ChannelHealth::Alive),
            Behavior::Disabled => Ok(ChannelHealth::Disabled),
            Behavior::DisabledError => Err(TransportError::Disabled),
            Behavior::Transient => Err(TransportError::Transient("503".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(ChannelHealth::Alive)
            }
        }
    }
}

/// Dispatcher that records what it was handed and when.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub dispatched: Mutex<Vec<(JobId, tokio::time::Instant)>>,
    pub reject: Mutex<HashSet<String>>,
    pub panic_on: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl RecordingDispatcher {
    pub fn ids(&self) -> Vec<JobId> {
        self.dispatched.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: Job) -> Result<(), DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(job.status, JobStatus::InProgress, "dispatched jobs must be claimed");
        if self.panic_on.lock().contains(job.job_id.as_str()) {
            panic!("dispatcher blew up on {}", job.job_id);
        }
        if self.reject.lock().contains(job.job_id.as_str()) {
            return Err(DispatchError::Rejected("queue unavailable".into()));
        }
        tokio::task::yield_now().await;
        self.dispatched
            .lock()
            .push((job.job_id, tokio::time::Instant::now()));
        Ok(())
    }
}

pub fn new_job(id: &str, principal: &str) -> NewJob {
    NewJob::new(id, principal, format!("https://media.example/watch/{id}"), 3)
}

/// Create a job and drive it to `Completed` through the registry.
pub async fn completed_job(registry: &dyn JobRegistry, id: &str, principal: &str) -> Job {
    registry.create(new_job(id, principal)).await.unwrap();
    let job_id = JobId::from(id);
    registry.claim(&job_id, JobStatus::Pending).await.unwrap();
    registry
        .complete(
            &job_id,
            ResultMetadata {
                size_bytes: 1_024,
                storage_key: format!("{principal}/{id}.mp4"),
                content_type: "video/mp4".into(),
                extension: "mp4".into(),
                title: Some("Sunset timelapse".into()),
                thumbnail_url: Some("https://img.example/42.jpg".into()),
                ..ResultMetadata::default()
            },
        )
        .await
        .unwrap()
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
