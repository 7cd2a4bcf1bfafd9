//! Job lifecycle model, collaborator contracts and the orchestration engines.

pub mod audit;
pub mod backoff;
pub mod channel;
pub mod collaborators;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod job;
pub mod pruner;
pub mod registry;
pub mod scheduler;
pub mod worker;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, SharedAuditSink};
pub use backoff::RetryPolicy;
pub use channel::{Channel, ChannelCursor, ChannelHealth, ChannelPage};
pub use collaborators::{
    ByteStream, JobDispatcher, MediaFormat, MediaStore, NotificationDispatch, NotificationPayload,
    NotificationTransport, NotificationTrigger, SourceFetcher, SourceMetadata, StoredObject,
};
pub use directory::RecipientDirectory;
pub use error::{
    AppResult, AttemptError, DirectoryError, DispatchError, FanoutError, NotifyError, RegistryError,
    SourceError, StorageError, TransportError, WorkerError,
};
pub use fanout::{ChannelFailure, ChannelFailureReason, FanoutReport, NotificationFanout};
pub use job::{DiscoverySource, Job, JobStatus, NewJob, ResultMetadata};
pub use pruner::{ChannelPruner, PruneError, PruneReport, PrunerLimits};
pub use registry::{DueCursor, DuePage, JobRegistry, ReclaimSummary};
pub use scheduler::{DispatchFailure, Scheduler, SchedulerLimits, SchedulerReport, SourceCounters};
pub use worker::{Worker, WorkerOutcome};
